//! Cross-module scenarios for `lib_ticketwatch`. The tests live in `tests/`.
