//! Argument-vector templates for pass and validation commands.
//!
//! Each argument may reference `{file}` (the file being optimized) and
//! `{workspace}` (the workspace root). Literal braces are written `{{` and
//! `}}`. Templates are parsed when the pipeline is loaded so a typo in a
//! placeholder is a configuration error rather than a failed attempt.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use thiserror::Error;

/// One piece of a templated argument.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    /// Text copied verbatim.
    Literal(String),
    /// Replaced by the path of the file being optimized.
    File,
    /// Replaced by the workspace root.
    Workspace,
}

/// Problems found while parsing a command template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The argument vector was empty, so there is no program to run.
    #[error("command must name a program")]
    Empty,
    /// The program argument was blank.
    #[error("command program must not be blank")]
    BlankProgram,
    /// A placeholder other than `{file}` or `{workspace}` was used.
    #[error("unknown placeholder '{{{name}}}' in argument '{argument}'")]
    UnknownPlaceholder {
        /// Placeholder name found between the braces.
        name: String,
        /// Raw argument containing it.
        argument: String,
    },
    /// An opening brace was never closed.
    #[error("unclosed placeholder in argument '{argument}'")]
    Unclosed {
        /// Raw argument containing the brace.
        argument: String,
    },
}

/// A parsed command whose arguments may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: Vec<String>,
    arguments: Vec<Vec<TemplateSegment>>,
}

impl CommandTemplate {
    /// Parses an argument vector.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for an empty vector, a blank program or a
    /// malformed placeholder.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, TemplateError> {
        let Some(program) = raw.first() else {
            return Err(TemplateError::Empty);
        };
        if program.as_ref().trim().is_empty() {
            return Err(TemplateError::BlankProgram);
        }
        let arguments = raw
            .iter()
            .map(|argument| parse_argument(argument.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.iter().map(|argument| argument.as_ref().to_owned()).collect(),
            arguments,
        })
    }

    /// Arguments as written in the pipeline file.
    #[must_use]
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Substitutes placeholders, producing the program followed by its
    /// arguments.
    #[must_use]
    pub fn render(&self, file: &Path, workspace: &Path) -> Vec<OsString> {
        self.arguments
            .iter()
            .map(|segments| {
                let mut rendered = OsString::new();
                for segment in segments {
                    match segment {
                        TemplateSegment::Literal(text) => rendered.push(text),
                        TemplateSegment::File => rendered.push(file.as_os_str()),
                        TemplateSegment::Workspace => rendered.push(workspace.as_os_str()),
                    }
                }
                rendered
            })
            .collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw.join(" "))
    }
}

fn parse_argument(argument: &str) -> Result<Vec<TemplateSegment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = argument.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(TemplateError::Unclosed {
                        argument: argument.to_owned(),
                    });
                }
                let placeholder = match name.trim() {
                    "file" => TemplateSegment::File,
                    "workspace" => TemplateSegment::Workspace,
                    _ => {
                        return Err(TemplateError::UnknownPlaceholder {
                            name,
                            argument: argument.to_owned(),
                        });
                    }
                };
                if !literal.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(placeholder);
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(TemplateSegment::Literal(literal));
    }
    Ok(segments)
}
