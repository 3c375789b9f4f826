// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use loam_common::model::{ArgSpec, PrepSpec, Preposition, VerbArgsSpec};
use loam_common::util::parse_into_words;
use loam_var::{NOTHING, Obj};
use thiserror::Error;

/// The command parser's output, and the source for the command frame's environment
/// (`dobjstr`, `prepstr`, and friends).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub verb: String,
    pub argstr: String,
    pub args: Vec<String>,
    pub dobjstr: String,
    pub dobj: Obj,
    pub prepstr: String,
    pub prep: PrepSpec,
    pub iobjstr: String,
    pub iobj: Obj,
}

impl Default for ParsedCommand {
    fn default() -> Self {
        Self {
            verb: String::new(),
            argstr: String::new(),
            args: vec![],
            dobjstr: String::new(),
            dobj: NOTHING,
            prepstr: String::new(),
            prep: PrepSpec::None,
            iobjstr: String::new(),
            iobj: NOTHING,
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParseCommandError {
    #[error("Empty command")]
    EmptyCommand,
}

/// Tokenize an input line into verb, argstr, and the dobj/prep/iobj split. Object
/// resolution happens later, against the player's vicinity; here the slots stay strings.
///
/// The leading-punctuation shorthand is rewritten first (`"` say, `:` emote, `;` eval), so
/// everything downstream (`do_command`, verbs, `huh`) sees the normalized form.
pub fn parse_command(input: &str) -> Result<ParsedCommand, ParseCommandError> {
    let mut command = input.trim_start().to_string();
    let first_char = command.chars().next().unwrap_or(' ');
    match first_char {
        '"' => command.replace_range(..1, "say "),
        ':' => command.replace_range(..1, "emote "),
        ';' => command.replace_range(..1, "eval "),
        _ => {}
    };

    let all_words = parse_into_words(&command);
    if all_words.is_empty() {
        return Err(ParseCommandError::EmptyCommand);
    }

    let mut parts = command.splitn(2, ' ');
    let verb = parts.next().unwrap_or_default().to_string();
    let argstr = parts.next().unwrap_or_default().to_string();
    let words = parse_into_words(&argstr);

    // Find the longest-spanning preposition; `in front of` must win over `in`.
    let (prep_span, prep) = seek_preposition(&words);

    let (dobjstr, prepstr, iobjstr) = match prep_span {
        Some((start, len)) => (
            words[..start].join(" "),
            words[start..start + len].join(" "),
            words[start + len..].join(" "),
        ),
        None => (words.join(" "), String::new(), String::new()),
    };

    Ok(ParsedCommand {
        verb,
        argstr,
        args: words,
        dobjstr,
        dobj: NOTHING,
        prepstr,
        prep,
        iobjstr,
        iobj: NOTHING,
    })
}

/// Scan for the earliest preposition; at that position the longest span wins, so
/// `drop ball in front of house` binds `in front of` rather than `in`.
fn seek_preposition(words: &[String]) -> (Option<(usize, usize)>, PrepSpec) {
    for start in 0..words.len() {
        for len in (1..=Preposition::MAX_PHRASE_WORDS.min(words.len() - start)).rev() {
            let phrase = words[start..start + len].join(" ").to_lowercase();
            if let Some(p) = Preposition::parse(&phrase) {
                return (Some((start, len)), PrepSpec::Other(p));
            }
        }
    }
    (None, PrepSpec::None)
}

impl ParsedCommand {
    /// The argspec this command presents to a candidate receiver, for matching against
    /// verb declarations: a slot is `This` when it resolved to the candidate itself.
    #[must_use]
    pub fn spec_for_candidate(&self, candidate: Obj) -> VerbArgsSpec {
        let dobj = if self.dobjstr.is_empty() {
            ArgSpec::None
        } else if self.dobj == candidate {
            ArgSpec::This
        } else {
            ArgSpec::Any
        };
        let iobj = if self.iobjstr.is_empty() && self.prepstr.is_empty() {
            ArgSpec::None
        } else if self.iobj == candidate {
            ArgSpec::This
        } else if self.iobjstr.is_empty() {
            ArgSpec::None
        } else {
            ArgSpec::Any
        };
        VerbArgsSpec {
            dobj,
            prep: self.prep,
            iobj,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_command() {
        let pc = parse_command("look ball").unwrap();
        assert_eq!(pc.verb, "look");
        assert_eq!(pc.argstr, "ball");
        assert_eq!(pc.dobjstr, "ball");
        assert_eq!(pc.prep, PrepSpec::None);
        assert_eq!(pc.prepstr, "");
        assert_eq!(pc.iobjstr, "");
    }

    #[test]
    fn test_prepositional_command() {
        let pc = parse_command("put ball in box").unwrap();
        assert_eq!(pc.verb, "put");
        assert_eq!(pc.dobjstr, "ball");
        assert_eq!(pc.prepstr, "in");
        assert_eq!(pc.prep, PrepSpec::Other(Preposition::IntoIn));
        assert_eq!(pc.iobjstr, "box");
    }

    #[test]
    fn test_multiword_preposition_beats_prefix() {
        let pc = parse_command("drop ball in front of house").unwrap();
        assert_eq!(pc.dobjstr, "ball");
        assert_eq!(pc.prepstr, "in front of");
        assert_eq!(pc.prep, PrepSpec::Other(Preposition::InFrontOf));
        assert_eq!(pc.iobjstr, "house");
    }

    #[test]
    fn test_say_emote_eval_shorthand() {
        let pc = parse_command("\"hello there").unwrap();
        assert_eq!(pc.verb, "say");
        assert_eq!(pc.argstr, "hello there");

        let pc = parse_command(":grins").unwrap();
        assert_eq!(pc.verb, "emote");
        assert_eq!(pc.argstr, "grins");

        let pc = parse_command(";1 + 1").unwrap();
        assert_eq!(pc.verb, "eval");
        assert_eq!(pc.argstr, "1 + 1");
    }

    #[test]
    fn test_empty_command() {
        assert_eq!(parse_command("   "), Err(ParseCommandError::EmptyCommand));
    }

    #[test]
    fn test_quoted_words() {
        let pc = parse_command("give \"blue ball\" to wizard").unwrap();
        assert_eq!(pc.dobjstr, "blue ball");
        assert_eq!(pc.prepstr, "to");
        assert_eq!(pc.iobjstr, "wizard");
    }

    #[test]
    fn test_spec_for_candidate() {
        let mut pc = parse_command("put ball in box").unwrap();
        let ball = Obj::mk_id(5);
        let box_ = Obj::mk_id(6);
        pc.dobj = ball;
        pc.iobj = box_;
        let spec = pc.spec_for_candidate(ball);
        assert_eq!(spec.dobj, ArgSpec::This);
        assert_eq!(spec.iobj, ArgSpec::Any);
        assert_eq!(spec.prep, PrepSpec::Other(Preposition::IntoIn));
        let spec = pc.spec_for_candidate(box_);
        assert_eq!(spec.dobj, ArgSpec::Any);
        assert_eq!(spec.iobj, ArgSpec::This);
    }
}
