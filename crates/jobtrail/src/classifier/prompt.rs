//! Prompt templates as plain data.
//!
//! Templates carry `{name}` placeholders filled through a substitution
//! map, keeping prompt text separate from control logic so the backend
//! can change without touching the classifier.

/// A static prompt template with `{name}` placeholders.
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Substitutes every `{key}` occurrence with its value. Unknown
    /// placeholders are left verbatim.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.template.to_string();
        for (key, value) in vars {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

/// Extraction prompt for messages already known to be job-related.
pub const EXTRACT: PromptTemplate = PromptTemplate::new(
    r#"You are an assistant that analyzes job application emails.
The email below comes from a known job platform. Extract the details.

Respond ONLY with JSON:
{
  "company": "Name of the hiring company",
  "position": "Job title",
  "status": "SENT | VIEWED | INTERVIEW | OFFER | REJECTED",
  "confidence": 0.0 to 1.0
}

Status rules:
- SENT: application receipt or submission confirmation
- VIEWED: the application or profile was viewed by the recruiter
- INTERVIEW: interview invitation, phone screen, technical test
- OFFER: employment offer or contract proposal
- REJECTED: rejection, position filled
If the company name is missing, use the name from the "From" field.
If the position is missing, use "Unspecified".

Email:
---
From: {from}
Subject: {subject}
Body: {body}
---"#,
);

/// Relevance-then-extract prompt for unrecognized senders.
pub const CLASSIFY: PromptTemplate = PromptTemplate::new(
    r#"You are an assistant that decides whether an email concerns a job application.

STEP 1: Decide if this email relates to a job application.
YES if it is: an application receipt, a viewed-application notification, an interview invitation, an offer, a rejection.
NO if it is: a newsletter, a social notification, a promotional email, a service unrelated to hiring.

STEP 2: If yes, extract the details.

Respond ONLY with JSON:
{
  "isJobRelated": true/false,
  "company": "Hiring company (or 'N/A' if unrelated)",
  "position": "Job title (or 'Unspecified')",
  "status": "SENT | VIEWED | INTERVIEW | OFFER | REJECTED",
  "confidence": 0.0 to 1.0
}

Status rules: SENT (receipt), VIEWED (viewed), INTERVIEW (interview), OFFER (offer), REJECTED (rejection).

Email:
---
From: {from}
Subject: {subject}
Body: {body}
---"#,
);
