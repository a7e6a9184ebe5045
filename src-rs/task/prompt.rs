use super::types::{GenerationRequest, ModuleKind};
use crate::host::ContextMessage;
use crate::llm::{Message, Prompt, Role};

fn module_brief(module: ModuleKind, request: &GenerationRequest) -> String {
    match module {
        ModuleKind::Theater => format!(
            "You write a short {} piece inspired by the ongoing conversation. Answer with self-contained HTML.",
            request.content.as_str()
        ),
        ModuleKind::Diary => {
            "You write a diary entry from the character's point of view about the recent conversation.".to_string()
        }
        ModuleKind::Companion => {
            "You are a chat companion commenting on the ongoing conversation in a few lines.".to_string()
        }
    }
}

/// Assembles the prompt for unit `index` (0-based) of `total`.
pub fn build_prompt(
    module: ModuleKind,
    request: &GenerationRequest,
    context: &[ContextMessage],
    index: usize,
    total: usize,
) -> Prompt {
    let mut messages = vec![Message::new(Role::System, module_brief(module, request))];
    if !context.is_empty() {
        let transcript = context
            .iter()
            .map(|m| format!("{}: {}", m.name, m.text))
            .collect::<Vec<_>>()
            .join("\n");
        messages.push(Message::new(
            Role::User,
            format!("Recent conversation:\n{}", transcript),
        ));
    }
    let mut ask = String::new();
    if !request.instruction.is_empty() {
        ask.push_str(&request.instruction);
        ask.push_str("\n\n");
    }
    if total > 1 {
        ask.push_str(&format!("Write part {} of {}.", index + 1, total));
    } else {
        ask.push_str("Write it now.");
    }
    messages.push(Message::new(Role::User, ask));
    Prompt { messages }
}
