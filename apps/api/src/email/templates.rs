//! Static email template table.
//!
//! Four fixed entries, never mutated. The `instruction` of the selected
//! template is the first section of every prompt.

use serde::Serialize;

pub const DEFAULT_TEMPLATE_ID: &str = "default";

#[derive(Debug, PartialEq, Eq)]
pub struct EmailTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
}

/// Public projection returned by `GET /api/templates`. The instruction text
/// stays server-side.
#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl From<&EmailTemplate> for TemplateSummary {
    fn from(t: &EmailTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name,
            description: t.description,
        }
    }
}

static TEMPLATES: [EmailTemplate; 4] = [
    EmailTemplate {
        id: "formal",
        name: "Formal",
        description: "Professional and traditional approach",
        instruction: "Write a formal job application email that highlights the candidate's relevant \
            skills and experience matching the job description. Use professional language, proper \
            business format, and maintain a respectful tone throughout. Include a clear subject \
            line, proper salutation, structured body paragraphs, and professional closing.",
    },
    EmailTemplate {
        id: "creative",
        name: "Creative",
        description: "Engaging and memorable approach",
        instruction: "Write a creative and engaging job application email that showcases the \
            candidate's personality while maintaining professionalism. Make it memorable with a \
            unique opening, showcase enthusiasm for the role, and use compelling language that \
            stands out without being overly casual. Include specific examples of how the \
            candidate's skills match the role.",
    },
    EmailTemplate {
        id: "direct",
        name: "Direct",
        description: "Concise and to the point",
        instruction: "Write a direct and concise job application email that gets straight to the \
            point. Focus on key qualifications and how they directly match the job requirements. \
            Use clear, straightforward language, bullet points for key skills, and avoid \
            unnecessary fluff while maintaining professionalism.",
    },
    EmailTemplate {
        id: DEFAULT_TEMPLATE_ID,
        name: "Standard",
        description: "Balanced professional approach",
        instruction: "Write a professional job application email that effectively matches the \
            candidate's skills and experience with the job requirements. Use a balanced tone that \
            is both professional and personable. Highlight the most relevant qualifications, \
            express genuine interest in the position and company, and end with a call to action.",
    },
];

/// All templates in stable display order.
pub fn all() -> &'static [EmailTemplate] {
    &TEMPLATES
}

pub fn find(id: &str) -> Option<&'static EmailTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Looks up `id`, falling back to the Standard template for unknown ids.
pub fn resolve(id: &str) -> &'static EmailTemplate {
    find(id).unwrap_or(&TEMPLATES[3])
}

pub fn summaries() -> Vec<TemplateSummary> {
    all().iter().map(TemplateSummary::from).collect()
}
