use chrono::{Datelike, Utc};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.5rem; }
        nav { display: flex; gap: 0.75rem; align-items: center; flex-wrap: wrap; }
        nav a { color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        nav a:hover { background: #bfdbfe; }
        nav form { margin: 0; }
        nav button { padding: 0.45rem 0.9rem; border-radius: 999px; background: #fee2e2; color: #0f172a; border: 1px solid #fecaca; }
        main { padding: 2rem 1.5rem; max-width: 1080px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-bottom: 0.5rem; font-weight: 600; }
        input[type="file"], input[type="number"], input[type="text"] { padding: 0.6rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; box-sizing: border-box; }
        .panel form > input[type="text"], .panel form > input[type="number"] { display: block; width: 100%; margin-bottom: 1rem; }
        button { padding: 0.7rem 1.1rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        button.danger { background: #dc2626; }
        button.secondary { background: #e2e8f0; color: #0f172a; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; background: #ffffff; }
        th, td { padding: 0.6rem 0.8rem; border-bottom: 1px solid #e2e8f0; text-align: left; font-size: 0.92rem; }
        th { background: #f1f5f9; }
        td form { display: inline-flex; gap: 0.4rem; margin: 0; }
        td input[type="number"] { width: 6rem; padding: 0.35rem; }
        td button { padding: 0.35rem 0.7rem; font-size: 0.85rem; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .flash { padding: 0.85rem 1rem; border-radius: 10px; margin-bottom: 1.5rem; }
        .flash.success { background: #dcfce7; color: #166534; }
        .flash.error { background: #fee2e2; color: #b91c1c; }
        .flash.warning { background: #fef3c7; color: #92400e; }
        .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 1rem; }
        .card { display: block; background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 1.25rem; text-decoration: none; color: inherit; }
        .card:hover { border-color: #93c5fd; }
        .stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 0.75rem; margin: 1rem 0; }
        .stat { background: #f1f5f9; border-radius: 10px; padding: 0.85rem; }
        .stat strong { display: block; font-size: 1.4rem; }
        .tag { display: inline-flex; padding: 0.2rem 0.6rem; border-radius: 999px; font-size: 0.8rem; font-weight: 600; }
        .tag.created { background: #dcfce7; color: #166534; }
        .tag.error { background: #fee2e2; color: #b91c1c; }
        .row-actions { display: flex; gap: 0.75rem; flex-wrap: wrap; margin-top: 1rem; align-items: center; }
        .row-actions a { color: #2563eb; font-weight: 600; text-decoration: none; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
"#;

pub struct PageLayout<'a> {
    pub title: &'a str,
    pub user_name: Option<&'a str>,
    pub flash_html: String,
    pub body_html: String,
    /// Seconds until the browser reloads the page, for in-progress states.
    pub refresh_after: Option<u32>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        user_name,
        flash_html,
        body_html,
        refresh_after,
    } = layout;

    let refresh_meta = refresh_after
        .map(|secs| format!(r#"<meta http-equiv="refresh" content="{secs}">"#))
        .unwrap_or_default();

    let user_html = user_name
        .map(|name| format!(r#"<span class="note">Signed in as {}</span>"#, escape_html(name)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} · Pharmacy Admin</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    {refresh_meta}
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{title}</h1>
            <nav>
                {user_html}
                <a href="/">Dashboard</a>
                <a href="/inventory">Inventory</a>
                <form method="post" action="/logout"><button type="submit">Sign out</button></form>
            </nav>
        </div>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        refresh_meta = refresh_meta,
        styles = PAGE_BASE_STYLES,
        user_html = user_html,
        flash_html = flash_html,
        body_html = body_html,
        footer = render_footer(),
    )
}

pub fn render_login_page(error: Option<&str>, flash_html: &str) -> String {
    let error_html = error
        .map(|message| format!(r#"<div class="flash error">{}</div>"#, escape_html(message)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Sign in · Pharmacy Admin</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
        :root {{ color-scheme: light; }}
        body {{ font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; padding: 1.5rem; box-sizing: border-box; }}
        main {{ width: 100%; max-width: 420px; }}
        .panel {{ background: #ffffff; padding: 2.5rem 2.25rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); border: 1px solid #e2e8f0; }}
        h1 {{ margin: 0 0 1.5rem; font-size: 1.6rem; text-align: center; }}
        label {{ display: block; margin-top: 1.2rem; font-weight: 600; }}
        input {{ width: 100%; padding: 0.85rem; margin-top: 0.65rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; font-size: 1rem; box-sizing: border-box; }}
        button {{ margin-top: 2rem; width: 100%; padding: 0.95rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; }}
        .flash {{ padding: 0.85rem 1rem; border-radius: 10px; margin-bottom: 1rem; }}
        .flash.error {{ background: #fee2e2; color: #b91c1c; }}
        .flash.success {{ background: #dcfce7; color: #166534; }}
        .app-footer {{ margin-top: 2rem; text-align: center; font-size: 0.85rem; color: #64748b; }}
    </style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>Pharmacy Admin</h1>
            {flash_html}
            {error_html}
            <form method="post" action="/login">
                <label for="email">Email</label>
                <input id="email" type="email" name="email" autocomplete="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" autocomplete="current-password" required>
                <button type="submit">Sign in</button>
            </form>
        </section>
        {footer}
    </main>
</body>
</html>"#,
        flash_html = flash_html,
        error_html = error_html,
        footer = render_footer(),
    )
}

/// Shown while the stored session is still being validated.
pub fn render_loading_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Loading · Pharmacy Admin</title>
    <meta http-equiv="refresh" content="1">
    <style>
        body {{ font-family: "Helvetica Neue", Arial, sans-serif; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f8fafc; color: #475569; }}
    </style>
</head>
<body>
    <p>Loading…</p>
</body>
</html>"#
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(r#"<footer class="app-footer">© {current_year} Pharmacy Admin · internal use only</footer>"#)
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
