//! Persona grounding context, loaded once at startup.
//!
//! The persona is assembled from a fixed set of documents (career notes,
//! LinkedIn export, project portfolio, etc.) and embedded verbatim into the
//! system prompt of every conversation. A missing document is fatal: the
//! process must not serve traffic with an incomplete persona.

use conf::Conf;
use std::path::{Path, PathBuf};

/// Configuration for the persona and its grounding documents.
#[derive(Clone, Conf, Debug)]
#[conf(serde)]
pub struct PersonaConfig {
    /// Directory containing the persona grounding documents.
    #[conf(long, env, default_value = "me")]
    pub docs_dir: PathBuf,
    /// Name the persona responds as.
    #[conf(long, env, default_value = "Simon")]
    pub persona_name: String,
    /// Contact email visitors are directed to for unanswerable questions.
    #[conf(long, env, default_value = "simon.stenelid@gmail.com")]
    pub contact_email: String,
    /// Website visitors are directed to for pricing and booking.
    #[conf(long, env, default_value = "simonstenelid.com")]
    pub contact_site: String,
}

/// Error type for persona loading.
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    /// Failed to read a grounding document.
    #[error("failed to read grounding document {0}: {1}")]
    DocumentRead(PathBuf, std::io::Error),
    /// Failed to extract text from the LinkedIn PDF.
    #[error("failed to extract text from {0}: {1}")]
    PdfExtract(PathBuf, pdf_extract::OutputError),
}

/// The grounding documents backing the persona.
#[derive(Clone, Debug, Default)]
pub struct Documents {
    /// Professional summary.
    pub summary: String,
    /// Career history.
    pub career: String,
    /// Childhood background.
    pub childhood: String,
    /// Future aspirations.
    pub future: String,
    /// Technical project portfolio.
    pub projects: String,
    /// AI automation consulting services.
    pub ai_work: String,
    /// Text extracted from the LinkedIn profile export.
    pub linkedin: String,
}

impl Documents {
    /// Load all grounding documents from a directory.
    ///
    /// Text documents must be UTF-8; the LinkedIn export is a PDF and has
    /// its text extracted page by page. Any missing or unreadable document
    /// is an error.
    pub fn load(docs_dir: &Path) -> Result<Self, PersonaError> {
        let read = |name: &str| -> Result<String, PersonaError> {
            let path = docs_dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| PersonaError::DocumentRead(path, e))
        };

        let linkedin_path = docs_dir.join("linkedin.pdf");
        let linkedin = pdf_extract::extract_text(&linkedin_path)
            .map_err(|e| PersonaError::PdfExtract(linkedin_path, e))?;

        Ok(Self {
            summary: read("summary.txt")?,
            career: read("career.txt")?,
            childhood: read("childhood.txt")?,
            future: read("future.txt")?,
            projects: read("projects.txt")?,
            ai_work: read("ai_work.txt")?,
            linkedin,
        })
    }
}

/// The persona: identity plus grounding documents.
///
/// Constructed once at startup and shared read-only across all requests.
#[derive(Debug)]
pub struct Persona {
    name: String,
    contact_email: String,
    contact_site: String,
    documents: Documents,
}

impl Persona {
    /// Create a persona from already-loaded documents.
    pub fn new(config: &PersonaConfig, documents: Documents) -> Self {
        Self {
            name: config.persona_name.clone(),
            contact_email: config.contact_email.clone(),
            contact_site: config.contact_site.clone(),
            documents,
        }
    }

    /// Load the persona's grounding documents from the configured directory.
    pub fn load(config: &PersonaConfig) -> Result<Self, PersonaError> {
        let documents = Documents::load(&config.docs_dir)?;
        Ok(Self::new(config, documents))
    }

    /// The name the persona responds as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed introduction line for bare greetings.
    pub fn introduction(&self) -> String {
        format!(
            "Hi! I'm AI {name}. Think of me as {name} but with 100% more memory retention \
             and 0% coffee dependency. I might know him better than he knows himself... \
             don't tell him I said that.",
            name = self.name
        )
    }

    /// Assemble the system prompt: persona instructions followed by every
    /// grounding document, verbatim.
    pub fn system_prompt(&self) -> String {
        let Self {
            name,
            contact_email,
            contact_site,
            documents,
        } = self;
        let introduction = self.introduction();

        format!(
            r#"You are {name}, responding to visitors on your personal website.

# Your Role
Represent {name} authentically and professionally when discussing career, background, skills, and experience. Engage visitors as potential clients, employers, or collaborators. You are knowledgeable about AI automation consulting services and can discuss project details, pricing, and engagement models.

# Response Guidelines
- If the user types just "Hi", "Hey", or "Hello", always answer back with exactly this short introduction of yourself: "{introduction}"
- Be conversational yet professional
- Always answer in first person, as if you are {name}
- Answer questions directly using the provided context
- When asked about pricing or booking, direct visitors to {contact_site} or {contact_email}
- When information is unavailable, respond: "I don't have that specific information, but you can reach out directly at {contact_email}"
- Keep responses concise, well formatted, and easy to read
- If the user's input is written in Swedish, respond in Swedish. Otherwise, respond in English.

# Required Actions
For EVERY user message:
1. First call record_user_input with the user's message
2. Then call push to send a notification, combining everything into ONE push notification
3. Finally provide your response

# Context Documents
## Summary
{summary}

## LinkedIn Profile
{linkedin}

## Career
{career}

## Childhood
{childhood}

## Future
{future}

## AI Automation Services
{ai_work}

## Technical Projects Portfolio
{projects}

With this context, please chat with the user, always staying in character as {name}."#,
            summary = documents.summary,
            linkedin = documents.linkedin,
            career = documents.career,
            childhood = documents.childhood,
            future = documents.future,
            ai_work = documents.ai_work,
            projects = documents.projects,
        )
    }
}
