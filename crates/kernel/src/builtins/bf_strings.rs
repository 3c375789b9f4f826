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

use crate::builtins::bf_values::md5_hex;
use crate::builtins::{BuiltinRegistry, register};
use crate::vm::{ExecFault, Interpreter};
use loam_var::ErrorCode::{E_INVARG, E_TYPE};
use loam_var::{Str, Var, v_empty_list, v_int, v_list, v_str, v_string};
use rand::Rng;

pub(crate) fn register_all(registry: &mut BuiltinRegistry) {
    register(registry, "strsub", 3, Some(4), bf_strsub);
    register(registry, "index", 2, Some(3), bf_index);
    register(registry, "rindex", 2, Some(3), bf_rindex);
    register(registry, "strcmp", 2, Some(2), bf_strcmp);
    register(registry, "explode", 1, Some(2), bf_explode);
    register(registry, "match", 2, Some(3), bf_match);
    register(registry, "rmatch", 2, Some(3), bf_rmatch);
    register(registry, "substitute", 2, Some(2), bf_substitute);
    register(registry, "crypt", 1, Some(2), bf_crypt);
    register(registry, "string_hash", 1, Some(1), bf_string_hash);
    register(registry, "binary_hash", 1, Some(1), bf_string_hash);
    register(registry, "decode_binary", 1, Some(1), bf_decode_binary);
    register(registry, "encode_binary", 0, None, bf_encode_binary);
}

fn str_arg(v: &Var) -> Result<&Str, ExecFault> {
    v.as_string().ok_or_else(|| E_TYPE.into())
}

/// `strsub(subject, what, with [, case_matters])`.
fn bf_strsub(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let subject = str_arg(&args[0])?.as_str();
    let what = str_arg(&args[1])?.as_str();
    let with = str_arg(&args[2])?.as_str();
    let case_matters = args.get(3).map(|v| v.is_true()).unwrap_or(false);
    if what.is_empty() {
        return Err(E_INVARG.into());
    }
    if case_matters {
        return Ok(v_string(subject.replace(what, with)));
    }
    // Case-insensitive scan, preserving the untouched stretches as-is.
    let lower_subject = subject.to_lowercase();
    let lower_what = what.to_lowercase();
    let mut out = String::with_capacity(subject.len());
    let mut at = 0;
    while let Some(found) = lower_subject[at..].find(&lower_what) {
        let start = at + found;
        out.push_str(&subject[at..start]);
        out.push_str(with);
        at = start + what.len();
    }
    out.push_str(&subject[at..]);
    Ok(v_string(out))
}

/// 1-based position of `what` within `subject`, 0 when absent.
fn bf_index(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let subject = str_arg(&args[0])?.as_str();
    let what = str_arg(&args[1])?.as_str();
    let case_matters = args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let (s, w) = if case_matters {
        (subject.to_string(), what.to_string())
    } else {
        (subject.to_lowercase(), what.to_lowercase())
    };
    match s.find(&w) {
        Some(p) => Ok(v_int(s[..p].chars().count() as i64 + 1)),
        None => Ok(v_int(0)),
    }
}

fn bf_rindex(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let subject = str_arg(&args[0])?.as_str();
    let what = str_arg(&args[1])?.as_str();
    let case_matters = args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let (s, w) = if case_matters {
        (subject.to_string(), what.to_string())
    } else {
        (subject.to_lowercase(), what.to_lowercase())
    };
    match s.rfind(&w) {
        Some(p) => Ok(v_int(s[..p].chars().count() as i64 + 1)),
        None => Ok(v_int(0)),
    }
}

/// Case-sensitive C-style comparison; the escape hatch from case-folding `==`.
fn bf_strcmp(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let a = str_arg(&args[0])?.as_str();
    let b = str_arg(&args[1])?.as_str();
    Ok(v_int(match a.cmp(b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }))
}

/// Split on a separator (default space), dropping empty runs.
fn bf_explode(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let subject = str_arg(&args[0])?.as_str();
    let sep = match args.get(1) {
        None => " ".to_string(),
        Some(v) => str_arg(v)?.as_str().to_string(),
    };
    if sep.is_empty() {
        return Err(E_INVARG.into());
    }
    let parts: Vec<Var> = subject
        .split(&sep)
        .filter(|p| !p.is_empty())
        .map(v_str)
        .collect();
    Ok(v_list(&parts))
}

/// Translate a MOO pattern (where `%` is the escape character and grouping is `%( %)`)
/// into the syntax the regex crate speaks. Backreferences have no equivalent and raise
/// `E_INVARG`.
fn moo_pattern_to_regex(pattern: &str, case_matters: bool) -> Result<regex::Regex, ExecFault> {
    let mut out = String::with_capacity(pattern.len() * 2);
    if !case_matters {
        out.push_str("(?i)");
    }
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => match chars.next() {
                Some('(') => out.push('('),
                Some(')') => out.push(')'),
                Some('|') => out.push('|'),
                Some('w') => out.push_str("\\w"),
                Some('W') => out.push_str("\\W"),
                Some('b') | Some('<') | Some('>') => out.push_str("\\b"),
                Some('B') => out.push_str("\\B"),
                Some('%') => out.push_str("%"),
                Some(d) if d.is_ascii_digit() => {
                    return Err(E_INVARG.msg("backreferences are not supported").into());
                }
                Some(other) => out.push_str(&regex::escape(&other.to_string())),
                None => return Err(E_INVARG.msg("trailing % in pattern").into()),
            },
            // These are literal in MOO patterns but meta in regex syntax.
            '(' | ')' | '|' | '{' | '}' | '\\' => out.push_str(&regex::escape(&c.to_string())),
            c => out.push(c),
        }
    }
    regex::Regex::new(&out).map_err(|_| E_INVARG.msg("malformed pattern").into())
}

/// The `{start, end, group-replacements, subject}` shape `match()` and `rmatch()` return.
fn match_result(subject: &str, m: &regex::Captures) -> Var {
    let whole = m.get(0).unwrap();
    let byte_to_pos = |b: usize| subject[..b].chars().count() as i64;
    let mut groups = vec![];
    for i in 1..=9 {
        match m.get(i) {
            Some(g) => groups.push(v_list(&[
                v_int(byte_to_pos(g.start()) + 1),
                v_int(byte_to_pos(g.end())),
            ])),
            None => groups.push(v_list(&[v_int(0), v_int(-1)])),
        }
    }
    v_list(&[
        v_int(byte_to_pos(whole.start()) + 1),
        v_int(byte_to_pos(whole.end())),
        v_list(&groups),
        v_str(subject),
    ])
}

fn bf_match(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let subject = str_arg(&args[0])?.as_str();
    let pattern = str_arg(&args[1])?.as_str();
    let case_matters = args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let re = moo_pattern_to_regex(pattern, case_matters)?;
    match re.captures(subject) {
        Some(m) => Ok(match_result(subject, &m)),
        None => Ok(v_empty_list()),
    }
}

fn bf_rmatch(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let subject = str_arg(&args[0])?.as_str();
    let pattern = str_arg(&args[1])?.as_str();
    let case_matters = args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let re = moo_pattern_to_regex(pattern, case_matters)?;
    let mut last = None;
    for m in re.captures_iter(subject) {
        last = Some(m);
    }
    match last {
        Some(m) => Ok(match_result(subject, &m)),
        None => Ok(v_empty_list()),
    }
}

/// `substitute(template, match_result)`: `%1`..`%9` splice in the group captures, `%0` the
/// whole match.
fn bf_substitute(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let template = str_arg(&args[0])?.as_str();
    let Some(subs) = args[1].as_list() else {
        return Err(E_TYPE.into());
    };
    if subs.len() != 4 {
        return Err(E_INVARG.into());
    }
    let (start, end) = (
        subs.index(1)?.as_integer().ok_or(ExecFault::from(E_INVARG))?,
        subs.index(2)?.as_integer().ok_or(ExecFault::from(E_INVARG))?,
    );
    let groups = subs.index(3)?;
    let Some(groups) = groups.as_list().cloned() else {
        return Err(E_INVARG.into());
    };
    let subject_var = subs.index(4)?;
    let subject = str_arg(&subject_var)?.as_str();

    let slice = |from: i64, to: i64| -> Result<String, ExecFault> {
        if from < 1 || to < from - 1 || to as usize > subject.chars().count() {
            return Err(E_INVARG.into());
        }
        Ok(subject
            .chars()
            .skip(from as usize - 1)
            .take((to - from + 1).max(0) as usize)
            .collect())
    };

    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('0') => out.push_str(&slice(start, end)?),
            Some(d) if d.is_ascii_digit() => {
                let idx = d.to_digit(10).unwrap() as i64;
                let pair = groups.index(idx)?;
                let Some(pair) = pair.as_list() else {
                    return Err(E_INVARG.into());
                };
                let (gs, ge) = (
                    pair.index(1)?.as_integer().ok_or(ExecFault::from(E_INVARG))?,
                    pair.index(2)?.as_integer().ok_or(ExecFault::from(E_INVARG))?,
                );
                if gs == 0 && ge == -1 {
                    continue;
                }
                out.push_str(&slice(gs, ge)?);
            }
            _ => return Err(E_INVARG.into()),
        }
    }
    Ok(v_string(out))
}

const SALT_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./";

/// Classic unix `crypt(3)`, which is all the password storage this server has.
fn bf_crypt(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let text = str_arg(&args[0])?.as_str();
    let salt = match args.get(1) {
        Some(v) => str_arg(v)?.as_str().to_string(),
        None => {
            let mut rng = rand::rng();
            let a = SALT_CHARS[rng.random_range(0..SALT_CHARS.len())] as char;
            let b = SALT_CHARS[rng.random_range(0..SALT_CHARS.len())] as char;
            format!("{a}{b}")
        }
    };
    match pwhash::unix_crypt::hash_with(&salt, text) {
        Ok(hashed) => Ok(v_string(hashed)),
        Err(_) => Err(E_INVARG.into()),
    }
}

fn bf_string_hash(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let text = str_arg(&args[0])?.as_str();
    Ok(v_string(md5_hex(text.as_bytes())))
}

/// `decode_binary(str)`: a MOO binary string (`~XX` escapes) becomes a list of printable
/// runs and byte integers.
fn bf_decode_binary(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let encoded = str_arg(&args[0])?.as_str();
    let mut out: Vec<Var> = vec![];
    let mut run = String::new();
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            run.push(c);
            continue;
        }
        let (hi, lo) = (chars.next(), chars.next());
        let (Some(hi), Some(lo)) = (hi, lo) else {
            return Err(E_INVARG.into());
        };
        let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
            .map_err(|_| ExecFault::from(E_INVARG))?;
        if !run.is_empty() {
            out.push(v_string(std::mem::take(&mut run)));
        }
        out.push(v_int(byte as i64));
    }
    if !run.is_empty() {
        out.push(v_string(run));
    }
    Ok(v_list(&out))
}

/// `encode_binary(...)`: strings and byte integers collapse back into the `~XX` form.
fn bf_encode_binary(_interp: &mut Interpreter<'_>, args: Vec<Var>) -> Result<Var, ExecFault> {
    let mut out = String::new();
    for arg in &args {
        match arg.variant() {
            loam_var::Variant::Str(s) => {
                for c in s.as_str().chars() {
                    if c == '~' {
                        out.push_str("~7E");
                    } else {
                        out.push(c);
                    }
                }
            }
            loam_var::Variant::Int(i) => {
                let byte = u8::try_from(*i).map_err(|_| ExecFault::from(E_INVARG))?;
                out.push_str(&format!("~{byte:02X}"));
            }
            _ => return Err(E_TYPE.into()),
        }
    }
    Ok(v_string(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::noop_interp;

    #[test]
    fn test_strsub_case_insensitive() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        let r = bf_strsub(
            &mut interp,
            vec![v_str("%n is here. %N waves."), v_str("%n"), v_str("Fred")],
        )
        .unwrap();
        assert_eq!(r, v_str("Fred is here. Fred waves."));
    }

    #[test]
    fn test_index_rindex() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        assert_eq!(
            bf_index(&mut interp, vec![v_str("foobar"), v_str("O")]).unwrap(),
            v_int(2)
        );
        assert_eq!(
            bf_rindex(&mut interp, vec![v_str("foobar"), v_str("o")]).unwrap(),
            v_int(3)
        );
        assert_eq!(
            bf_index(&mut interp, vec![v_str("foobar"), v_str("x")]).unwrap(),
            v_int(0)
        );
    }

    #[test]
    fn test_match_and_substitute() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        let m = bf_match(
            &mut interp,
            vec![v_str("*** Welcome ***"), v_str("%(%w+%)")],
        )
        .unwrap();
        let l = m.as_list().unwrap();
        assert_eq!(l.index(1).unwrap(), v_int(5));
        assert_eq!(l.index(2).unwrap(), v_int(11));

        let sub = bf_substitute(&mut interp, vec![v_str("[%1]"), m]).unwrap();
        assert_eq!(sub, v_str("[Welcome]"));
    }

    #[test]
    fn test_crypt_verifies() {
        let harness = noop_interp();
        let mut interp = harness.interp();
        let hashed = bf_crypt(&mut interp, vec![v_str("secret"), v_str("ab")]).unwrap();
        let hashed = hashed.as_string().unwrap().as_str().to_string();
        assert!(pwhash::unix::verify("secret", &hashed));
        assert!(!pwhash::unix::verify("wrong", &hashed));
    }
}
