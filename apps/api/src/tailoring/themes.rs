//! Theme catalogue: JSON Resume themes offered for every tailored resume.
//!
//! Rendering a theme happens outside this service; here we only build the links.

use serde::Serialize;

pub const THEMES: &[&str] = &[
    "elegant",
    "flat",
    "even",
    "kendall",
    "macchiato",
    "pumpkin",
    "modern",
    "short",
    "paper",
    "tan-responsive",
    "rickosborne",
    "eloquent",
    "onepage-plus",
    "autumn",
    "spartan",
    "minimal",
    "crisp",
    "stackoverflow",
    "straightforward",
    "modern-extended",
    "rnord",
    "light-classy-responsive",
    "simplyelegant",
    "projects",
    "msresume",
    "dark-classy-responsive",
    "onepage",
    "slick",
    "rocketspacer",
    "direct",
    "compact",
    "clean",
    "actual",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemedResume {
    pub theme: String,
    pub label: String,
    pub preview_url: String,
    pub download_url: String,
}

/// Payload of a successful tailoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailoredResult {
    pub resume_id: String,
    pub resumes: Vec<ThemedResume>,
}

pub fn is_known_theme(theme: &str) -> bool {
    THEMES.contains(&theme)
}

/// `"tan-responsive"` → `"Tan-responsive"`.
pub fn theme_label(theme: &str) -> String {
    let mut chars = theme.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn themed_results(resume_id: &str) -> TailoredResult {
    TailoredResult {
        resume_id: resume_id.to_string(),
        resumes: THEMES
            .iter()
            .map(|theme| ThemedResume {
                theme: theme.to_string(),
                label: theme_label(theme),
                preview_url: format!("/api/v1/resumes/{resume_id}/preview?theme={theme}"),
                download_url: format!("/api/v1/resumes/{resume_id}/download?theme={theme}"),
            })
            .collect(),
    }
}
