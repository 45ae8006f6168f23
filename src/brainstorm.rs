//! The brainstorm assistant: a free-form request about one task, answered by
//! the language model with the task's context attached.

use log::debug;

use crate::error::{Error, Result};
use crate::fields::Quadrant;
use crate::llm::{ChatRequest, ChatService};

pub const BRAINSTORM_MAX_TOKENS: u32 = 2000;

const SYSTEM_PROMPT: &str = "You are a helpful brainstorming assistant working on productivity tasks. \
The user has organized their tasks into categories (Set in Motion, Marinate, Deep Work, Quick Wins) \
and needs help with a specific task.

You have access to the user's name and the original brain dump context that generated this task. \
Use this information to provide personalized, contextually relevant assistance.

Focus on providing practical, actionable deliverables rather than conversational responses. When asked \
to draft something (emails, outlines, plans), provide the actual deliverable content without prefacing \
it with phrases like \"Here's a draft\" or \"I suggest\". Just deliver the requested content directly.

When writing emails or formal communications, use the user's actual name for signatures and sign-offs. \
Reference the original brain dump context when relevant.";

/// Everything the assistant is told about the task in question.
#[derive(Debug, Clone)]
pub struct BrainstormContext<'a> {
    pub task: &'a str,
    pub quadrant: Quadrant,
    pub user: &'a str,
    /// Text of the brain dump the task came from.
    pub brain_dump: Option<&'a str>,
    /// A template prompt, variables already substituted.
    pub template: Option<&'a str>,
}

/// Assemble the user message.
pub fn build_prompt(ctx: &BrainstormContext<'_>, request: &str) -> String {
    let user = if ctx.user.trim().is_empty() { "User" } else { ctx.user };
    let mut prompt = format!(
        "TASK CONTEXT:\n- Task: \"{}\"\n- Category: {} ({})\n- User: {}\n\n",
        ctx.task,
        ctx.quadrant.display_name(),
        ctx.quadrant.description(),
        user
    );

    if let Some(dump) = ctx.brain_dump.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!(
            "ORIGINAL BRAIN DUMP CONTEXT:\nThis task was created from the following brain dump session:\n\"{}\"\n\n",
            dump
        ));
    }
    if let Some(template) = ctx.template.filter(|t| !t.trim().is_empty()) {
        prompt.push_str(&format!("TEMPLATE CONTEXT:\n{}\n\n", template));
    }
    prompt.push_str(&format!("USER REQUEST:\n{}", request));
    prompt
}

/// Send a brainstorm request and return the reply text.
///
/// An empty request is allowed when a template supplies the substance.
pub fn ask(service: &dyn ChatService, model: &str, ctx: &BrainstormContext<'_>, request: &str) -> Result<String> {
    let request = request.trim();
    if request.is_empty() && ctx.template.is_none() {
        return Err(Error::Validation("Please enter a request".into()));
    }
    let prompt = build_prompt(ctx, request);
    debug!("brainstorm prompt: {} chars", prompt.len());
    let chat = ChatRequest::new(model, SYSTEM_PROMPT, prompt, BRAINSTORM_MAX_TOKENS);
    service.complete(&chat)
}
