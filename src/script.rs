//! Script post-processing: variable collection and decompilation.
//!
//! Scripts are reconstructed in two passes. Pass one (the parsers and
//! struct readers) collects headers, raw bytecode, source text, local
//! variables and external references for every script, ESM and runtime
//! alike. Pass two, here, first builds a map of variables across *all*
//! scripts, each indexed under its own form ID and under its owner
//! quest's, then decompiles each script's bytecode with an
//! external-variable resolver over that map, so `rQuest.fTimer` renders
//! with the variable's real name even when it lives in another script.
//!
//! Decompilation endianness follows provenance: bytecode harvested from
//! the dump is big-endian, bytecode from ESM subrecords little-endian.

use std::collections::HashMap;
use std::{error, fmt};

use log::debug;

use crate::bytes::{self, Endian};
use crate::records::{FormId, ScriptRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompileError {
    TruncatedStatement { offset: usize },
    TruncatedExpression { offset: usize },
    UnknownToken { offset: usize, token: u8 },
}

impl fmt::Display for DecompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedStatement { offset } => {
                write!(f, "statement truncated at byte {offset}")
            }
            Self::TruncatedExpression { offset } => {
                write!(f, "expression truncated at byte {offset}")
            }
            Self::UnknownToken { offset, token } => {
                write!(f, "unknown expression token {token:#04x} at byte {offset}")
            }
        }
    }
}

impl error::Error for DecompileError {}

// Statement opcodes.
const OP_BEGIN: u16 = 0x0010;
const OP_END: u16 = 0x0011;
const OP_SET: u16 = 0x0015;
const OP_IF: u16 = 0x0016;
const OP_ELSEIF: u16 = 0x0017;
const OP_ELSE: u16 = 0x0018;
const OP_ENDIF: u16 = 0x0019;
const OP_SCRIPTNAME: u16 = 0x001D;
const OP_RETURN: u16 = 0x001E;

// Expression tokens.
const TOK_REF: u8 = b'r';
const TOK_FLOAT_VAR: u8 = b'f';
const TOK_SHORT_VAR: u8 = b's';
const TOK_GLOBAL: u8 = b'G';
const TOK_INT_LIT: u8 = b'n';
const TOK_FLOAT_LIT: u8 = b'z';
const TOK_FUNCTION: u8 = b'X';

fn block_type_name(code: u16) -> String {
    match code {
        0 => "GameMode".to_string(),
        1 => "MenuMode".to_string(),
        2 => "OnActivate".to_string(),
        3 => "OnAdd".to_string(),
        4 => "OnEquip".to_string(),
        5 => "OnUnequip".to_string(),
        6 => "OnDrop".to_string(),
        7 => "OnHit".to_string(),
        8 => "OnHitWith".to_string(),
        9 => "OnDeath".to_string(),
        10 => "OnMurder".to_string(),
        11 => "OnCombatEnd".to_string(),
        12 => "OnPackageStart".to_string(),
        13 => "OnPackageDone".to_string(),
        14 => "OnPackageChange".to_string(),
        15 => "OnLoad".to_string(),
        16 => "OnTriggerEnter".to_string(),
        17 => "OnTriggerLeave".to_string(),
        18 => "OnReset".to_string(),
        code => format!("Block{code}"),
    }
}

/// Console-function names for the handful of opcodes that dominate
/// vanilla scripts; anything else renders with its numeric opcode.
fn function_name(opcode: u16) -> String {
    match opcode {
        0x1001 => "GetDistance".to_string(),
        0x1006 => "GetPos".to_string(),
        0x100E => "GetSecondsPassed".to_string(),
        0x1019 => "GetDead".to_string(),
        0x1023 => "GetItemCount".to_string(),
        0x102E => "GetActorValue".to_string(),
        0x103A => "GetStage".to_string(),
        0x103C => "SetStage".to_string(),
        0x1043 => "GetQuestRunning".to_string(),
        0x104C => "StartQuest".to_string(),
        0x104D => "StopQuest".to_string(),
        0x1075 => "GetDisabled".to_string(),
        0x10A3 => "ShowMessage".to_string(),
        0x10C2 => "PlaySound".to_string(),
        opcode => format!("Func_{opcode:04X}"),
    }
}

/// Variables of every known script, indexed for external resolution.
///
/// A quest script's variables are reachable both through the script's
/// own form ID and through the quest's, since compiled references name
/// whichever form the scripter pointed at.
#[derive(Debug, Default)]
pub struct VariableMap {
    by_owner: HashMap<FormId, Vec<(u32, String)>>,
}

impl VariableMap {
    #[must_use]
    pub fn build(scripts: &[ScriptRecord]) -> Self {
        let mut by_owner: HashMap<FormId, Vec<(u32, String)>> = HashMap::new();
        for script in scripts {
            let vars: Vec<(u32, String)> = script
                .variables
                .iter()
                .map(|v| (v.index, v.name.clone()))
                .collect();
            if vars.is_empty() {
                continue;
            }
            by_owner.entry(script.header.form_id).or_insert_with(|| vars.clone());
            if let Some(quest) = script.owner_quest {
                by_owner.entry(quest).or_insert(vars);
            }
        }
        debug!("variable map covers {} owners", by_owner.len());
        Self { by_owner }
    }

    #[must_use]
    pub fn variable_name(&self, owner: FormId, index: u32) -> Option<&str> {
        self.by_owner
            .get(&owner)?
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, name)| name.as_str())
    }

    #[must_use]
    pub fn owners(&self) -> usize {
        self.by_owner.len()
    }
}

/// Aggregate results of the decompilation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStats {
    pub decompiled: usize,
    pub failed: usize,
    pub cross_script_hits: u32,
}

struct Decompiler<'a> {
    script: &'a ScriptRecord,
    vars: &'a VariableMap,
    /// FormID → editor ID, for naming external references.
    names: &'a HashMap<FormId, String>,
    endian: Endian,
    hits: u32,
}

impl<'a> Decompiler<'a> {
    fn ref_name(&self, form_id: FormId) -> String {
        self.names
            .get(&form_id)
            .cloned()
            .unwrap_or_else(|| format!("Form_{form_id:08X}"))
    }

    /// The form an `r`/`G` token points at, via the script's reference
    /// list (1-based in the compiled stream).
    fn resolve_ref(&self, ref_index: u16) -> Option<FormId> {
        let slot = (ref_index as usize).checked_sub(1)?;
        self.script.references.get(slot)?.form_id
    }

    fn local_name(&mut self, owner: Option<FormId>, index: u16) -> String {
        match owner {
            Some(form) => match self.vars.variable_name(form, index.into()) {
                Some(name) => {
                    self.hits += 1;
                    name.to_string()
                }
                None => format!("var{index}"),
            },
            None => self
                .vars
                .variable_name(self.script.header.form_id, index.into())
                .map_or_else(|| format!("var{index}"), str::to_string),
        }
    }

    /// Render the token stream of one expression.
    fn expression(&mut self, data: &[u8], base: usize) -> Result<String, DecompileError> {
        let mut out: Vec<String> = Vec::new();
        let mut cursor = 0usize;
        // Set after an `r` token so the next variable token resolves in
        // the referenced script instead of this one.
        let mut external: Option<FormId> = None;

        while cursor < data.len() {
            let offset = base + cursor;
            let token = data[cursor];
            match token {
                0x20 => cursor += 1,
                TOK_REF => {
                    let index = bytes::read_u16(data, cursor + 1, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?;
                    cursor += 3;
                    let form = self.resolve_ref(index);
                    let label = form.map_or_else(
                        || format!("Ref{index}"),
                        |form| self.ref_name(form),
                    );
                    external = form;
                    out.push(format!("{label}."));
                }
                TOK_FLOAT_VAR | TOK_SHORT_VAR => {
                    let index = bytes::read_u16(data, cursor + 1, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?;
                    cursor += 3;
                    let name = self.local_name(external.take(), index);
                    // Attach to a pending `Ref.` prefix if one is open.
                    match out.last_mut() {
                        Some(last) if last.ends_with('.') => last.push_str(&name),
                        _ => out.push(name),
                    }
                }
                TOK_GLOBAL => {
                    let index = bytes::read_u16(data, cursor + 1, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?;
                    cursor += 3;
                    let label = self
                        .resolve_ref(index)
                        .map_or_else(|| format!("Global{index}"), |form| self.ref_name(form));
                    out.push(label);
                }
                TOK_INT_LIT => {
                    let value = bytes::read_i32(data, cursor + 1, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?;
                    cursor += 5;
                    out.push(value.to_string());
                }
                TOK_FLOAT_LIT => {
                    let value = bytes::read_f64(data, cursor + 1, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?;
                    cursor += 9;
                    out.push(format!("{value}"));
                }
                TOK_FUNCTION => {
                    let opcode = bytes::read_u16(data, cursor + 1, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?;
                    let param_len = bytes::read_u16(data, cursor + 3, self.endian)
                        .map_err(|_| DecompileError::TruncatedExpression { offset })?
                        as usize;
                    if cursor + 5 + param_len > data.len() {
                        return Err(DecompileError::TruncatedExpression { offset });
                    }
                    cursor += 5 + param_len;
                    let mut call = function_name(opcode);
                    if let Some(last) = out.last_mut() {
                        if last.ends_with('.') {
                            last.push_str(&call);
                            external = None;
                            continue;
                        }
                    }
                    if param_len > 0 {
                        call.push_str(" ...");
                    }
                    out.push(call);
                }
                b'+' | b'-' | b'*' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'=' | b'!'
                | b'&' | b'|' => {
                    // Two-byte operators arrive as adjacent ASCII bytes.
                    let mut op = String::from(token as char);
                    if let Some(&next) = data.get(cursor + 1) {
                        if matches!(next, b'=' | b'&' | b'|') && matches!(token, b'=' | b'!' | b'<' | b'>' | b'&' | b'|') {
                            op.push(next as char);
                            cursor += 1;
                        }
                    }
                    cursor += 1;
                    out.push(op);
                }
                token => return Err(DecompileError::UnknownToken { offset, token }),
            }
        }
        Ok(out.join(" "))
    }

    fn run(&mut self) -> Result<String, DecompileError> {
        // Cloned so statement payloads can be sliced while `self`
        // resolves variables mutably (hit counting).
        let code = self.script.bytecode.clone();
        let mut lines: Vec<String> = Vec::new();
        let mut indent = 0usize;
        let mut cursor = 0usize;

        while cursor < code.len() {
            let opcode = bytes::read_u16(&code, cursor, self.endian)
                .map_err(|_| DecompileError::TruncatedStatement { offset: cursor })?;
            let length = bytes::read_u16(&code, cursor + 2, self.endian)
                .map_err(|_| DecompileError::TruncatedStatement { offset: cursor })?
                as usize;
            if cursor + 4 + length > code.len() {
                return Err(DecompileError::TruncatedStatement { offset: cursor });
            }
            let payload = &code[cursor + 4..cursor + 4 + length];
            let payload_base = cursor + 4;
            cursor += 4 + length;

            let line = match opcode {
                OP_SCRIPTNAME => {
                    let name = self
                        .script
                        .header
                        .editor_id
                        .clone()
                        .unwrap_or_else(|| format!("Script_{:08X}", self.script.header.form_id));
                    format!("scn {name}")
                }
                OP_BEGIN => {
                    let block = bytes::read_u16(payload, 0, self.endian).unwrap_or(0);
                    let line = format!("Begin {}", block_type_name(block));
                    lines.push(indent_line(indent, &line));
                    indent += 1;
                    continue;
                }
                OP_END => {
                    indent = indent.saturating_sub(1);
                    "End".to_string()
                }
                OP_SET => {
                    let body = self.expression(payload, payload_base)?;
                    match body.split_once(' ') {
                        Some((target, rest)) => format!("set {target} to {rest}"),
                        None => format!("set {body}"),
                    }
                }
                OP_IF => {
                    let line = format!("if {}", self.expression(payload, payload_base)?);
                    lines.push(indent_line(indent, &line));
                    indent += 1;
                    continue;
                }
                OP_ELSEIF => {
                    let line = format!("elseif {}", self.expression(payload, payload_base)?);
                    lines.push(indent_line(indent.saturating_sub(1), &line));
                    continue;
                }
                OP_ELSE => {
                    lines.push(indent_line(indent.saturating_sub(1), "else"));
                    continue;
                }
                OP_ENDIF => {
                    indent = indent.saturating_sub(1);
                    "endif".to_string()
                }
                OP_RETURN => "return".to_string(),
                opcode if opcode >= 0x1000 => function_name(opcode),
                opcode => format!("; statement {opcode:#06x} ({length} bytes)"),
            };
            lines.push(indent_line(indent, &line));
        }
        Ok(lines.join("\n"))
    }
}

fn indent_line(depth: usize, line: &str) -> String {
    let mut out = String::new();
    for _ in 0..depth {
        out.push('\t');
    }
    out.push_str(line);
    out
}

/// Decompile one script. On failure the error is returned for the
/// caller to fold into a comment; the catalog never loses the record.
pub fn decompile(
    script: &ScriptRecord,
    vars: &VariableMap,
    names: &HashMap<FormId, String>,
) -> Result<(String, u32), DecompileError> {
    let mut decompiler = Decompiler {
        script,
        vars,
        names,
        endian: Endian::from_big(script.bytecode_big_endian),
        hits: 0,
    };
    let text = decompiler.run()?;
    Ok((text, decompiler.hits))
}

/// Pass two over every collected script: build the cross-script
/// variable map, then decompile each script in place.
pub fn post_process(
    scripts: &mut [ScriptRecord],
    names: &HashMap<FormId, String>,
) -> ScriptStats {
    let vars = VariableMap::build(scripts);
    let mut stats = ScriptStats::default();
    for script in scripts.iter_mut() {
        if script.bytecode.is_empty() {
            continue;
        }
        match decompile(script, &vars, names) {
            Ok((text, hits)) => {
                script.decompiled = Some(text);
                script.cross_script_hits = hits;
                stats.decompiled += 1;
                stats.cross_script_hits += hits;
            }
            Err(err) => {
                script.decompiled = Some(format!("; decompilation failed: {err}"));
                stats.failed += 1;
            }
        }
    }
    debug!(
        "scripts: {} decompiled, {} failed, {} cross-script hits",
        stats.decompiled, stats.failed, stats.cross_script_hits
    );
    stats
}
