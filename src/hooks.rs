//! Lifecycle hooks of the tasks service.

use chrono::{SecondsFormat, Utc};
use lattice_core::logging::Console;
use lattice_core::{ApplicationBuilder, Error, HookContext};
use serde_json::{Value, json};

/// Headers set on every response
pub const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Expires", "-1"),
    ("Pragma", "no-cache"),
    ("X-XSS-Protection", "1; mode=block"),
];

/// Register the service hooks.
///
/// - `init *`: hardened caching and XSS headers
/// - `shutdown api`: one access log line per served API request
/// - `error api`: the JSON error envelope
pub fn register(builder: &mut ApplicationBuilder, diagnostics: bool) {
    builder
        .init("*", &[], security_headers)
        .shutdown("api", &[], access_log)
        .error("api", &[], move |ctx| error_envelope(ctx, diagnostics));
}

fn security_headers(ctx: &mut HookContext<'_>) -> Result<(), Error> {
    for (name, value) in SECURITY_HEADERS {
        ctx.response.add_header(name, value);
    }
    Ok(())
}

fn access_log(ctx: &mut HookContext<'_>) -> Result<(), Error> {
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false);
    Console::success(&format!("{} {}", date, ctx.request.uri));
    Ok(())
}

/// `{code, getMessage}`, plus `phase` and `route` with diagnostics on
fn error_envelope(ctx: &mut HookContext<'_>, diagnostics: bool) -> Result<(), Error> {
    let Some(error) = ctx.error else {
        return Ok(());
    };

    let code = error.status_code();
    let mut body = json!({
        "code": code,
        "getMessage": error.to_string(),
    });

    if diagnostics {
        body["phase"] = ctx
            .failed_in
            .map(|phase| Value::String(phase.to_string()))
            .unwrap_or(Value::Null);
        body["route"] = ctx
            .route
            .map(|route| Value::String(route.pattern.clone()))
            .unwrap_or(Value::Null);
    }

    ctx.response.status = code;
    ctx.response.set_json(&body)?;
    Ok(())
}
