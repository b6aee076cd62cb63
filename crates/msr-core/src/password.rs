//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Generate-vs-push decision and authoritative credential resolution."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use crate::api::{PasswordUpdate, PasswordUpdated};

fn normalize(password: Option<&str>) -> Option<&str> {
    password.filter(|p| !p.is_empty())
}

/// Request for the desired credential. Absent or empty asks for generation.
pub fn request_for(desired: Option<&str>) -> PasswordUpdate {
    match normalize(desired) {
        Some(password) => PasswordUpdate::Plaintext(password.to_owned()),
        None => PasswordUpdate::Generate,
    }
}

/// Whether the desired credential differs from the recorded one.
///
/// Empty and absent are the same value.
pub fn differs(desired: Option<&str>, recorded: Option<&str>) -> bool {
    normalize(desired) != normalize(recorded)
}

/// The credential to record after `request` was answered with `response`.
///
/// A value generated by the control plane wins; otherwise the pushed value
/// stays authoritative.
pub fn resolve(request: &PasswordUpdate, response: &PasswordUpdated) -> Option<String> {
    if let Some(generated) = normalize(response.password.as_deref()) {
        return Some(generated.to_owned());
    }
    match request {
        PasswordUpdate::Plaintext(password) => Some(password.clone()),
        PasswordUpdate::Generate => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_absent_requests_generation() {
        assert_eq!(request_for(None), PasswordUpdate::Generate);
        assert_eq!(request_for(Some("")), PasswordUpdate::Generate);
        assert_eq!(
            request_for(Some("s3cret")),
            PasswordUpdate::Plaintext("s3cret".into())
        );
    }

    #[test]
    fn change_detection_treats_empty_as_absent() {
        assert!(!differs(None, Some("")));
        assert!(!differs(Some("a"), Some("a")));
        assert!(differs(Some("a"), Some("b")));
        assert!(differs(None, Some("a")));
        assert!(differs(Some("a"), None));
    }

    #[test]
    fn generated_value_overrides_pushed_value() {
        let pushed = PasswordUpdate::Plaintext("mine".into());
        let echoed = PasswordUpdated { password: None };
        assert_eq!(resolve(&pushed, &echoed).as_deref(), Some("mine"));

        let empty = PasswordUpdated {
            password: Some(String::new()),
        };
        assert_eq!(resolve(&pushed, &empty).as_deref(), Some("mine"));

        let generated = PasswordUpdated {
            password: Some("server".into()),
        };
        assert_eq!(resolve(&pushed, &generated).as_deref(), Some("server"));
        assert_eq!(
            resolve(&PasswordUpdate::Generate, &generated).as_deref(),
            Some("server")
        );
    }
}
