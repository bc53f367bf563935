use serde::Deserialize;
use std::path::Path;
use log::info;

use super::content::SiteContent;
use super::{ ConfigError, load_json, parse_builtin };

const BUILTIN_PROMPTS: &str = include_str!("../../json/prompts.json");

const REQUIRED_PLACEHOLDERS: [&str; 2] = ["{company}", "{services}"];

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_template: String,
    pub greeting: String,
    pub error_message: String,
    pub stream_error_notice: String,
}

impl PromptConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for placeholder in REQUIRED_PLACEHOLDERS {
            if !self.system_template.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        Ok(())
    }

    /// Fills the system template with the company facts.
    pub fn render_system_prompt(&self, content: &SiteContent) -> String {
        self.system_template
            .replace("{company}", &content.company)
            .replace("{services}", &content.service_titles())
            .replace("{team}", &content.team_names())
            .replace("{technologies}", &content.technologies.join(", "))
            .replace("{email}", &content.email)
    }
}

pub fn load_prompts(path: Option<&str>) -> Result<PromptConfig, ConfigError> {
    let config: PromptConfig = match path {
        Some(p) => {
            info!("Loading prompts from {}", p);
            load_json(Path::new(p))?
        }
        None => parse_builtin("prompts.json", BUILTIN_PROMPTS)?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_prompt_names_company_team_and_services() {
        let prompts = load_prompts(None).unwrap();
        let content = SiteContent::builtin().unwrap();
        let system = prompts.render_system_prompt(&content);

        assert!(system.starts_with("You are an AI assistant for \"for loop de loop\""));
        assert!(
            system.contains(
                "- Services: Fullstack Web Development, Mobile App Development, AI & Machine Learning, AI Integration & Automation"
            )
        );
        assert!(system.contains("- Team members: Sahnik Biswas, Sankalpa Srakar, Shovon Halder, Shreyas Saha"));
        assert!(system.contains("- Email: for.loop.de.loop@gmail.com"));
        assert!(!system.contains('{'));
    }

    #[test]
    fn template_without_company_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"system_template": "Be nice. {{services}}", "greeting": "hi", "error_message": "sorry", "stream_error_notice": "cut"}}"#
        ).unwrap();

        let err = load_prompts(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPlaceholder("{company}")));
    }
}
