use crate::{
    engine::PageImage,
    models::Message,
    prompt::render_prompt,
    provider::Provider,
    report::SectionResult,
    retrieval::Toolbox,
    sections::Section,
    util::truncate_chars,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};

/// Where a grading conversation stands between model round-trips.
enum SessionState {
    AwaitingModel,
    DispatchingTools(Message),
    Done(Message),
}

/// Drives one model conversation per exam section.
pub struct SessionRunner<'a> {
    provider: &'a dyn Provider,
    toolbox: &'a Toolbox<'a>,
    persona: &'a str,
    max_tool_iterations: usize,
}

impl<'a> SessionRunner<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        toolbox: &'a Toolbox<'a>,
        persona: &'a str,
        max_tool_iterations: usize,
    ) -> Self {
        Self {
            provider,
            toolbox,
            persona,
            max_tool_iterations,
        }
    }

    /// Grade `section` from the pages that fall inside its range.
    ///
    /// The conversation history lives only for the duration of this call.
    pub fn run_section(&self, section: &Section, pages: &[PageImage]) -> Result<SectionResult> {
        let mut opening =
            Message::user().with_text(render_prompt(self.persona, &section.name, &section.description));
        let range = section.page_range();
        let mut shown = 0usize;
        for page in pages.iter().filter(|p| range.contains(&p.index)) {
            opening = opening.with_image(STANDARD.encode(&page.bytes), page.mime_type.clone());
            shown += 1;
        }
        if section.is_empty() {
            warn!(
                "section '{}' covers no exam pages; grading from the prompt alone",
                section.name
            );
        } else if shown == 0 {
            warn!(
                "no page images loaded for section '{}' (pages {}..{})",
                section.name, section.start_page, section.end_page
            );
        }
        info!("grading '{}' with {} page images", section.name, shown);

        let tools = self.toolbox.definitions();
        let mut history = vec![opening];
        let mut rounds = 0usize;
        let mut state = SessionState::AwaitingModel;

        let reply = loop {
            state = match state {
                SessionState::AwaitingModel => {
                    let (reply, usage) = self
                        .provider
                        .complete(&history, &tools)
                        .with_context(|| format!("model call for '{}'", section.name))?;
                    debug!(
                        input_tokens = ?usage.input_tokens,
                        output_tokens = ?usage.output_tokens,
                        "model replied"
                    );

                    if !reply.has_tool_requests() {
                        SessionState::Done(reply)
                    } else if rounds >= self.max_tool_iterations {
                        warn!(
                            "section '{}' hit the limit of {} tool rounds; using the last reply as-is",
                            section.name, self.max_tool_iterations
                        );
                        SessionState::Done(reply)
                    } else {
                        SessionState::DispatchingTools(reply)
                    }
                }
                SessionState::DispatchingTools(reply) => {
                    rounds += 1;
                    let mut responses = Message::user();
                    for request in reply.tool_requests() {
                        let output = match &request.tool_call {
                            Ok(call) => {
                                debug!(tool = %call.name, id = %request.id, "dispatching tool call");
                                match self.toolbox.dispatch(call)? {
                                    Ok(text) => text,
                                    Err(err) => err.to_string(),
                                }
                            }
                            Err(err) => err.to_string(),
                        };
                        debug!(id = %request.id, "tool output: {}", truncate_chars(&output, 160));
                        responses = responses.with_tool_response(request.id.clone(), output);
                    }
                    history.push(reply);
                    history.push(responses);
                    SessionState::AwaitingModel
                }
                SessionState::Done(reply) => break reply,
            };
        };

        debug!("section '{}' finished after {} tool rounds", section.name, rounds);
        Ok(SectionResult {
            name: section.name.clone(),
            content: reply.content_text(),
        })
    }
}
