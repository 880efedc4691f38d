//! Single-identity access probe.

use super::token::parse_claims;
use anyhow::Result;
use console::style;
use gatecheck_core::scenario::Outcome;
use gatecheck_core::{Config, ConnectOptions, Credential, Session};

/// Open `app` (and fetch the layout of `object`) and print the classified outcome.
///
/// No claims means the connection is made without a token.
pub fn run(
    config: &Config,
    engine: &str,
    app: &str,
    object: Option<&str>,
    claims: &[String],
) -> Result<()> {
    let claims = if claims.is_empty() {
        None
    } else {
        Some(parse_claims(claims)?)
    };
    let identity = match &claims {
        Some(c) => c.sub().unwrap_or("<no sub>").to_string(),
        None => "anonymous".to_string(),
    };

    let credential = config.signing.issuer().issue(claims.as_ref())?;
    let options = config.connection.connect_options();

    println!(
        "{} Probing {} as {}",
        style("→").cyan(),
        style(engine).bold(),
        style(&identity).cyan()
    );

    match probe(engine, credential.as_ref(), &options, app, object) {
        Ok(summary) => {
            println!("{} {}", style("✓").green(), summary);
            Ok(())
        }
        Err(e) => {
            let outcome = Outcome::from_error(&e);
            println!("{} {}", style("×").red(), outcome);
            if let Some(hint) = e.recovery_suggestion() {
                println!("  {} {}", style("Tip:").cyan(), hint);
            }
            anyhow::bail!("Probe of {} as {} did not succeed", app, identity)
        }
    }
}

fn probe(
    engine: &str,
    credential: Option<&Credential>,
    options: &ConnectOptions,
    app: &str,
    object: Option<&str>,
) -> gatecheck_core::Result<String> {
    let mut session = Session::connect(engine, credential, options)?;
    let app = session.open_app(app)?;

    let summary = match object {
        Some(id) => {
            let handle = session.read_object(&app, id)?;
            let layout = session.get_layout(&handle)?;
            format!(
                "read layout of {} ({}) in app {}: {} row(s)",
                layout.info.id,
                layout.info.kind,
                app.id(),
                layout.rows().len()
            )
        }
        None => format!("opened app {}", app.id()),
    };

    session.disconnect();
    Ok(summary)
}
