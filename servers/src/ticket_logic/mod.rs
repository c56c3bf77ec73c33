pub mod config;
pub mod downstream;
pub mod pages;
pub mod web;
