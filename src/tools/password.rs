use super::parse_flag;
use crate::backend::{MAX_PASSWORD_COUNT, MAX_PASSWORD_LENGTH};
use crate::model::{Request, Single};
use crate::orchestrator::LineDriven;
use crate::pipeline::Tool;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Random password generator. Driven entirely by its params; `refresh` regenerates.
pub struct PasswordGenerator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordParams {
    /// Number of passwords per batch.
    pub size: u16,
    pub length: u16,
    pub uppercase: bool,
    pub lowercase: bool,
    pub numeric: bool,
    pub special: bool,
    /// Characters never used, e.g. look-alikes such as `0O1l`.
    pub excludes: String,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            size: 5,
            length: 16,
            uppercase: true,
            lowercase: true,
            numeric: true,
            special: false,
            excludes: String::new(),
        }
    }
}

impl Tool for PasswordGenerator {
    type Input = ();
    type Mode = Single;
    type Params = PasswordParams;
    type Output = Vec<String>;

    const ROUTE: &'static str = "/generator/password";

    fn should_invoke(_: &(), params: &PasswordParams) -> bool {
        params.size > 0 && params.length > 0
    }

    fn request(_: &(), _: Single, params: &PasswordParams) -> Request {
        Request {
            operation: "generate_password",
            params: json!({
                "size": params.size,
                "length": params.length,
                "uppercase": params.uppercase,
                "lowercase": params.lowercase,
                "numeric": params.numeric,
                "special": params.special,
                "excludes": params.excludes,
            }),
        }
    }
}

impl LineDriven for PasswordGenerator {
    /// A bare line sets the password length.
    fn apply_line(_: &mut (), params: &mut PasswordParams, line: &str) -> Result<()> {
        params.length = parse_bounded(line, MAX_PASSWORD_LENGTH)
            .with_context(|| format!("expected a password length, got {line:?}"))?;
        Ok(())
    }

    fn parse_mode(_: &str) -> Option<Single> {
        None
    }

    fn apply_setting(_: &mut (), params: &mut PasswordParams, key: &str, value: &str) -> Result<()> {
        match key {
            "size" => params.size = parse_bounded(value, MAX_PASSWORD_COUNT).context("invalid size")?,
            "length" => {
                params.length = parse_bounded(value, MAX_PASSWORD_LENGTH).context("invalid length")?
            }
            "uppercase" => params.uppercase = parse_flag(value)?,
            "lowercase" => params.lowercase = parse_flag(value)?,
            "numeric" => params.numeric = parse_flag(value)?,
            "special" => params.special = parse_flag(value)?,
            "excludes" => params.excludes = value.to_string(),
            other => anyhow::bail!("unknown setting {other:?} for password"),
        }
        Ok(())
    }

    fn render(output: &Vec<String>) -> Vec<String> {
        if output.is_empty() {
            return vec!["no characters selected".into()];
        }
        output.clone()
    }
}

fn parse_bounded(value: &str, max: u16) -> Result<u16> {
    let n: u16 = value.trim().parse()?;
    if n > max {
        anyhow::bail!("{n} is above the maximum of {max}");
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_short_circuits() {
        let mut params = PasswordParams::default();
        assert!(PasswordGenerator::should_invoke(&(), &params));
        params.length = 0;
        assert!(!PasswordGenerator::should_invoke(&(), &params));
    }

    #[test]
    fn bare_line_sets_length() {
        let mut params = PasswordParams::default();
        PasswordGenerator::apply_line(&mut (), &mut params, " 24 ").unwrap();
        assert_eq!(params.length, 24);
        assert!(PasswordGenerator::apply_line(&mut (), &mut params, "long").is_err());
    }

    #[test]
    fn oversized_settings_are_rejected() {
        let mut params = PasswordParams::default();
        assert!(PasswordGenerator::apply_setting(&mut (), &mut params, "size", "65535").is_err());
        assert!(PasswordGenerator::apply_setting(&mut (), &mut params, "length", "4097").is_err());
        assert!(PasswordGenerator::apply_line(&mut (), &mut params, "65535").is_err());
        assert_eq!(params, PasswordParams::default());

        PasswordGenerator::apply_setting(&mut (), &mut params, "size", "1000").unwrap();
        assert_eq!(params.size, 1000);
    }
}
