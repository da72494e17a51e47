//! Greeting reply; no side effects

use careline_config::PromptsConfig;
use careline_core::Organization;

pub fn reply(organization: &Organization, prompts: &PromptsConfig) -> String {
    PromptsConfig::render(&prompts.greeting, &organization.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_names_tenant() {
        let org = Organization::new("acme", "Acme Clinic");
        assert!(reply(&org, &PromptsConfig::default()).contains("Acme Clinic"));
    }
}
