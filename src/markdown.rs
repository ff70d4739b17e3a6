//! Code blocks in assistant replies
//!
//! Replies are markdown. Fenced `sql` blocks are queries the user can apply to
//! the editor; every other block is display-only.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// A code block found in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// First word of the fence info string (`sql` in "```sql title=x")
    pub language: Option<String>,
    /// Block contents with surrounding whitespace trimmed
    pub code: String,
}

impl CodeBlock {
    /// Whether the block can replace the editor query
    pub fn is_applicable(&self) -> bool {
        self.language.as_deref() == Some("sql")
    }
}

pub fn code_blocks(markdown: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                current = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    block.code = block.code.trim().to_string();
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// SQL suggestions in order of appearance
pub fn applicable_queries(markdown: &str) -> Vec<String> {
    code_blocks(markdown)
        .into_iter()
        .filter(CodeBlock::is_applicable)
        .map(|b| b.code)
        .collect()
}

fn fence_language(info: &str) -> Option<String> {
    let word: String = info
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!word.is_empty()).then_some(word)
}
