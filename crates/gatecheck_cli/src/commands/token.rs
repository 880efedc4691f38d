//! Token signing command.

use anyhow::{Context, Result};
use gatecheck_core::{ClaimSet, ClaimValue, Config};

/// Sign the claims and print the token.
pub fn run(config: &Config, claims: &[String]) -> Result<()> {
    let claims = parse_claims(claims)?;
    let issuer = config.signing.issuer();

    let credential = issuer
        .issue(Some(&claims))?
        .context("Signing produced no token")?;

    println!("{}", credential.as_str());
    Ok(())
}

/// Parse repeated `--claim` arguments into a claim set.
pub fn parse_claims(args: &[String]) -> Result<ClaimSet> {
    args.iter()
        .try_fold(ClaimSet::new(), |claims, arg| {
            let (name, value) = parse_claim(arg)?;
            Ok(claims.with(&name, value))
        })
}

/// `name=text` is a string claim; `name:=json` is parsed as JSON (flags, lists).
fn parse_claim(arg: &str) -> Result<(String, ClaimValue)> {
    let (name, raw) = arg
        .split_once('=')
        .with_context(|| format!("Claim '{}' must look like name=value or name:=json", arg))?;

    let (name, value) = match name.strip_suffix(':') {
        Some(name) => {
            let value: ClaimValue = serde_json::from_str(raw).with_context(|| {
                format!("Claim '{}': value must be a boolean, string or string list", name)
            })?;
            (name, value)
        }
        None => (name, ClaimValue::from(raw)),
    };

    if name.is_empty() {
        anyhow::bail!("Claim '{}' has an empty name", arg);
    }
    Ok((name.to_string(), value))
}
