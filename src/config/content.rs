//! Static display content for the site: services, portfolio, team and
//! testimonials. Loaded once at startup and never mutated.

use log::info;
use serde::{ Deserialize, Serialize };
use std::path::Path;

use super::{ ConfigError, load_json, parse_builtin };

const BUILTIN_CONTENT: &str = include_str!("../../json/site_content.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub title: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberDescriptor {
    pub name: String,
    pub role: String,
    pub intro: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestimonialDescriptor {
    pub name: String,
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteContent {
    pub company: String,
    #[serde(default)]
    pub tagline: String,
    pub email: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
    #[serde(default)]
    pub additional_services: Vec<ServiceDescriptor>,
    #[serde(default)]
    pub projects: Vec<ProjectDescriptor>,
    #[serde(default)]
    pub team: Vec<TeamMemberDescriptor>,
    #[serde(default)]
    pub testimonials: Vec<TestimonialDescriptor>,
}

impl SiteContent {
    pub fn builtin() -> Result<Self, ConfigError> {
        parse_builtin("site_content.json", BUILTIN_CONTENT)
    }

    /// Loads `path` when given, otherwise the content compiled into the binary.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let content = match path {
            Some(p) => {
                info!("Loading site content from {}", p);
                load_json(Path::new(p))?
            }
            None => Self::builtin()?,
        };
        info!(
            "Site content: {} services, {} projects, {} team members, {} testimonials",
            content.services.len(),
            content.projects.len(),
            content.team.len(),
            content.testimonials.len()
        );
        Ok(content)
    }

    pub fn service_titles(&self) -> String {
        self.services
            .iter()
            .map(|s| s.title.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn team_names(&self) -> String {
        self.team
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
