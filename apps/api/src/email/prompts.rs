// Prompt fragments and assembly for email generation.

use crate::email::extract::JobDescription;
use crate::email::templates::EmailTemplate;

/// Appended to every prompt regardless of template.
pub const EMAIL_STRUCTURE_INSTRUCTION: &str = "\
Please generate a complete email with:
1. A compelling subject line
2. Professional salutation
3. Structured body paragraphs that:
   - Express interest in the position
   - Highlight relevant skills and experience
   - Show knowledge of the company (if implied in job description)
   - Connect candidate's qualifications to job requirements
4. Professional closing with call to action
5. Appropriate signature

Make the email personalized, professional, and tailored to the specific job description.
Format the response as a ready-to-use email.";

/// Stands in for the job description body when the description is sent as an
/// attached file rather than text.
pub const ATTACHED_DESCRIPTION_NOTE: &str = "\
The job description is provided in the attached file. Read it carefully and base the email on it.";

/// Assembles the full prompt for one generation call.
pub fn build_prompt(
    template: &EmailTemplate,
    job_description: &JobDescription,
    user_details: Option<&str>,
) -> String {
    let description = match job_description {
        JobDescription::Text(text) => text.as_str(),
        JobDescription::Attachment(_) => ATTACHED_DESCRIPTION_NOTE,
    };

    let mut prompt = format!(
        "{instruction}\n\nJOB DESCRIPTION:\n{description}\n\n",
        instruction = template.instruction,
    );

    if let Some(details) = user_details.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str("CANDIDATE INFORMATION TO INCORPORATE:\n");
        prompt.push_str(details);
        prompt.push_str("\n\n");
    }

    prompt.push_str(EMAIL_STRUCTURE_INSTRUCTION);
    prompt
}
