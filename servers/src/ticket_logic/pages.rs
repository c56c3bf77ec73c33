//! Minimal inline pages. Kept deliberately small: one form per credential
//! mode and a dashboard that renders whatever the viewer socket sends.

const SUBMIT_SCRIPT: &str = r#"
<script>
async function submitSecrets(event) {
  event.preventDefault();
  const form = new FormData(event.target);
  const body = Object.fromEntries(form.entries());
  const res = await fetch("/submitSecrets", {
    method: "POST",
    headers: {"Content-Type": "application/json"},
    body: JSON.stringify(body),
  });
  if (res.ok || res.redirected) {
    window.location = "/";
    return;
  }
  const err = await res.json().catch(() => ({error: res.statusText}));
  document.getElementById("error").textContent = err.error;
}
</script>
"#;

pub fn unlock_page() -> String {
    format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Unlock credentials</title></head>
<body>
<h1>Unlock saved API credentials</h1>
<form onsubmit="submitSecrets(event)">
  <label>Password <input type="password" name="password" autofocus></label>
  <button type="submit">Unlock</button>
</form>
<p id="error"></p>
{SUBMIT_SCRIPT}
</body></html>"#
    )
}

pub fn enter_page() -> String {
    format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Enter credentials</title></head>
<body>
<h1>Enter Autotask API credentials</h1>
<form onsubmit="submitSecrets(event)">
  <label>API username <input name="username"></label><br>
  <label>Integration code <input name="integrationCode"></label><br>
  <label>Secret <input type="password" name="secret"></label><br>
  <label>Password to encrypt with <input type="password" name="password"></label><br>
  <button type="submit">Save</button>
</form>
<p id="error"></p>
{SUBMIT_SCRIPT}
</body></html>"#
    )
}

const DASHBOARD_TEMPLATE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Unassigned tickets</title></head>
<body>
<h1>Unassigned tickets</h1>
<p>API polled every __POLL_SECS__ s. Last check: <span id="last">never</span>
   <span id="active"></span></p>
<ul id="tickets"></ul>
<script>
function connect() {
  const proto = location.protocol === "https:" ? "wss" : "ws";
  const ws = new WebSocket(proto + "://" + location.host + "/wsTickets");
  ws.onmessage = (event) => {
    const msg = JSON.parse(event.data);
    if (Array.isArray(msg)) {
      const list = document.getElementById("tickets");
      list.replaceChildren(...msg.map((t) => {
        const li = document.createElement("li");
        li.textContent = t.title + " (" + t.createDate + ")";
        li.title = t.description;
        return li;
      }));
    } else if (msg.type === "status") {
      document.getElementById("last").textContent = msg.lastApiCheck;
      document.getElementById("active").textContent = msg.isActive ? "" : "(outside active hours)";
    }
  };
  ws.onclose = () => setTimeout(connect, 5000);
}
connect();
</script>
</body></html>"#;

pub fn dashboard_page(poll_secs: u64) -> String {
    DASHBOARD_TEMPLATE.replace("__POLL_SECS__", &poll_secs.to_string())
}
