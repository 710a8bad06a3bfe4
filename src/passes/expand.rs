// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The expand pass: regenerates directive blocks.
//!
//! Each handler is a pure function of the node's block lines and positional
//! arguments plus the pass accumulators (module bind tables, recorded types,
//! exception hierarchy, opcode dispatch entries). Handlers never touch the
//! symbol table: generated code references symbols as `Q(0,"name")`
//! placeholders and the qstr pass assigns the real ids afterwards.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::context::GenContext;
use crate::error::{GenError, GenErrorKind};
use crate::parser::DirectiveNode;
use crate::passes::{DirectiveKind, Pass};

/// Argument type grammar: `name[:t]`, t one of v/i/o/s, default v.
fn split_typed(token: &str) -> Result<(String, char), GenError> {
    let (name, typ) = match token.split_once(':') {
        Some((name, typ)) => (name, typ.chars().next().unwrap_or('v')),
        None => (token, 'v'),
    };
    if !"vios".contains(typ) {
        return Err(dir_err("unknown argument type", Some(token)));
    }
    Ok((name.to_string(), typ))
}

fn base_type(typ: char) -> &'static str {
    match typ {
        'i' => "int",
        'o' => "Object",
        's' => "char const",
        _ => "Value",
    }
}

fn param_type(typ: char) -> &'static str {
    match typ {
        'i' => "int",
        'o' => "Object*",
        's' => "char const*",
        _ => "Value",
    }
}

/// Fetch expression per opcode type letter: format tag, fetch call, decl.
fn op_type(typ: &str) -> (&'static str, &'static str, &'static str) {
    if typ.contains('q') {
        (" %s", "fetchQ()", "Q arg")
    } else if typ.contains('v') {
        (" %u", "fetchV()", "int arg")
    } else if typ.contains('o') {
        (" %d", "fetchO()", "int arg")
    } else if typ.contains('s') {
        (" %d", "fetchO()-0x8000", "int arg")
    } else if typ.contains('m') {
        (" %d", "_ip[-1]", "uint32_t arg")
    } else {
        ("", "", "")
    }
}

/// Camel-cases an underscore-separated macro fragment (LOAD_CONST -> LoadConst).
fn camel(text: &str) -> String {
    text.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Parses a C integer token, tolerating surrounding parentheses.
fn parse_cint(token: &str) -> Option<i64> {
    let t = token.trim_matches(|c| c == '(' || c == ')');
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        t.parse().ok()
    }
}

fn dir_err(msg: &str, param: Option<&str>) -> GenError {
    GenError::new(GenErrorKind::Directive, msg, param)
}

/// Expand pass state: per-file flags plus run-wide accumulators.
pub struct ExpandPass {
    module: String,
    funs: HashMap<String, Vec<String>>,
    meths: HashMap<String, Vec<String>>,
    flags: HashSet<String>,
    type_fixed: Vec<(String, String, String)>,
    type_exposed: Vec<(String, String, String)>,
    exc_ids: HashMap<String, i32>,
    exc_hier: Vec<String>,
    exc_funs: Vec<String>,
    exc_defs: Vec<String>,
    opdefs: Vec<String>,
    opmulti: Vec<String>,
}

impl Default for ExpandPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpandPass {
    pub fn new() -> Self {
        let mut funs = HashMap::new();
        funs.insert(String::new(), Vec::new());
        let mut meths = HashMap::new();
        meths.insert(String::new(), Vec::new());
        Self {
            module: String::new(),
            funs,
            meths,
            flags: HashSet::new(),
            type_fixed: Vec::new(),
            type_exposed: Vec::new(),
            exc_ids: HashMap::new(),
            exc_hier: Vec::new(),
            exc_funs: Vec::new(),
            exc_defs: Vec::new(),
            opdefs: Vec::new(),
            opmulti: Vec::new(),
        }
    }

    fn args(&self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let mut out = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut types = String::new();
        let mut decls: Vec<(char, Vec<String>)> = Vec::new();
        for a in args {
            if a == "?" || a == "*" {
                types.push_str(a);
                continue;
            }
            let (name, typ) = split_typed(a)?;
            names.push(name.clone());
            types.push(typ);
            match decls.iter_mut().find(|(t, _)| *t == typ) {
                Some((_, group)) => group.push(name),
                None => decls.push((typ, vec![name])),
            }
        }
        for (typ, group) in &decls {
            if *typ == 'o' || *typ == 's' {
                out.push(format!("{} *{};", base_type(*typ), group.join(", *")));
            } else {
                out.push(format!("{} {};", base_type(*typ), group.join(", ")));
            }
        }
        let params: String = names.iter().map(|n| format!(",&{n}")).collect();
        out.push(format!("auto ainfo = args.parse(\"{types}\"{params});"));
        out.push("if (ainfo.isObj()) return ainfo;".to_string());
        Ok(Some(out))
    }

    fn bind(&mut self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let fun = args
            .first()
            .ok_or_else(|| dir_err("bind needs a function name", None))?;
        let mut params: Vec<String> = Vec::new();
        let mut types = String::new();
        for a in &args[1..] {
            if a == "?" || a == "*" {
                types.push_str(a);
                continue;
            }
            let (name, typ) = split_typed(a)?;
            params.push(format!("{} {}", param_type(typ), name));
            types.push(typ);
        }
        if types.contains('?') || types.contains('*') {
            params.insert(0, "ArgVec const& args".to_string());
        }
        self.funs
            .entry(self.module.clone())
            .or_default()
            .push(fun.clone());
        Ok(Some(vec![format!(
            "static auto f_{fun} ({}) -> Value {{",
            params.join(", ")
        )]))
    }

    fn kwargs(&self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        if args.is_empty() {
            return Err(dir_err("kwargs needs at least one option name", None));
        }
        let mut out = vec![
            format!("Value {};", args.join(", ")),
            "for (int i = 0; i < args.kwNum(); ++i) {".to_string(),
            "    auto k = args.kwKey(i), v = args.kwVal(i);".to_string(),
            "    switch (k.asQid()) {".to_string(),
        ];
        for a in args {
            out.push(format!("        case Q(0,\"{a}\"): {a} = v; break;"));
        }
        out.push("        default: return {E::TypeError, \"unknown option\", k};".to_string());
        out.push("    }".to_string());
        out.push("}".to_string());
        Ok(Some(out))
    }

    fn op(&mut self, block: &[String], args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let typ = args.first().map(String::as_str).unwrap_or("");
        let multi: i64 = match args.get(1) {
            Some(m) => m
                .parse()
                .map_err(|_| dir_err("op multi count must be an integer", Some(m)))?,
            None => 0,
        };
        let first = block
            .first()
            .ok_or_else(|| dir_err("op needs its signature line in the block", None))?;
        let token = first
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| dir_err("op signature line has no name token", Some(first)))?;
        let op = token
            .get(2..)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| dir_err("op name token too short", Some(token)))?;

        let (fmt, arg, decl) = op_type(typ);
        let trace = self.flags.contains("op:print");
        if typ.contains('m') {
            self.opmulti
                .push(format!("if ((uint32_t) (_ip[-1] - Op::{op}) < {multi}) {{"));
            self.opmulti.push(format!("    {decl} = _ip[-1] - Op::{op};"));
            if trace {
                self.opmulti
                    .push(format!("    printf(\"{op}{fmt}\\n\", (int) arg);"));
            }
            self.opmulti.push(format!("    op{op}(arg);"));
            self.opmulti.push("    break;".to_string());
            self.opmulti.push("}".to_string());
        } else {
            let brace = if arg.is_empty() { "" } else { " {" };
            self.opdefs.push(format!("case Op::{op}:{brace}"));
            if !arg.is_empty() {
                self.opdefs.push(format!("    {decl} = {arg};"));
            }
            if trace {
                let info = match fmt {
                    " %s" => ", (char const*) arg",
                    " %u" => ", (unsigned) arg",
                    _ if !arg.is_empty() => ", arg",
                    _ => "",
                };
                self.opdefs
                    .push(format!("    printf(\"{op}{fmt}\\n\"{info});"));
            }
            let call_arg = if arg.is_empty() { "" } else { "arg" };
            self.opdefs.push(format!("    op{op}({call_arg});"));
            if typ.contains('s') {
                self.opdefs.push("    loopCheck(arg);".to_string());
            }
            self.opdefs.push("    break;".to_string());
            if !arg.is_empty() {
                self.opdefs.push("}".to_string());
            }
        }
        Ok(Some(vec![format!("void op{op} ({decl}) {{")]))
    }

    /// Unknown or missing selectors leave the node unchanged so trees from
    /// older generator revisions keep processing.
    fn op_emit(&self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        match args.first().map(String::as_str) {
            Some("d") => Ok(Some(self.opdefs.clone())),
            Some("m") => Ok(Some(self.opmulti.clone())),
            _ => Ok(None),
        }
    }

    fn opcodes(
        &self,
        ctx: &mut GenContext,
        args: &[String],
    ) -> Result<Option<Vec<String>>, GenError> {
        let fname = args
            .first()
            .ok_or_else(|| dir_err("opcodes needs a header file argument", None))?;
        let text = match fs::read_to_string(fname) {
            Ok(text) => text,
            Err(_) => {
                ctx.note(format!("not found, keep as is: {fname}"));
                return Ok(None);
            }
        };
        let mut bases: HashMap<String, i64> = HashMap::new();
        let mut defs: Vec<(i64, String)> = Vec::new();
        for line in text.lines() {
            if !line.starts_with("#define") {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() <= 3 {
                continue;
            }
            if fields[3] == "//" {
                if let Some(value) = parse_cint(fields[2]) {
                    bases.insert(fields[1].to_string(), value);
                }
            } else if fields[3] == "+" {
                let base_name = fields[2].trim_start_matches('(');
                let Some(&base) = bases.get(base_name) else {
                    continue;
                };
                let Some(offset) = fields.get(4).and_then(|f| parse_cint(f)) else {
                    continue;
                };
                let key = camel(fields[1].get(6..).unwrap_or(""));
                defs.push((base + offset, key));
            }
        }
        defs.sort();
        Ok(Some(
            defs.iter()
                .map(|(value, key)| format!("{key:<22} = 0x{value:02X},"))
                .collect(),
        ))
    }

    fn binops(
        &self,
        ctx: &mut GenContext,
        args: &[String],
    ) -> Result<Option<Vec<String>>, GenError> {
        let fname = args
            .first()
            .ok_or_else(|| dir_err("binops needs a header file argument", None))?;
        let count: usize = match args.get(1) {
            Some(c) => c
                .parse()
                .map_err(|_| dir_err("binops count must be an integer", Some(c)))?,
            None => return Err(dir_err("binops needs a count argument", None)),
        };
        let text = match fs::read_to_string(fname) {
            Ok(text) => text,
            Err(_) => {
                ctx.note(format!("not found, keep as is: {fname}"));
                return Ok(None);
            }
        };
        let mut out = vec![String::new()];
        let mut remaining = count;
        for line in text.lines() {
            let line = line.trim();
            if !line.starts_with("MP_BINARY_OP_") {
                continue;
            }
            let token = line.split_whitespace().next().unwrap_or("");
            let item = camel(token.get(13..).unwrap_or(""));
            if out.last().map_or(true, |l| l.len() + item.len() > 70) {
                out.push(String::new());
            }
            if let Some(current) = out.last_mut() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&item);
            }
            remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                break;
            }
        }
        Ok(Some(out))
    }

    fn type_header(
        &mut self,
        block: &[String],
        args: &[String],
    ) -> Result<Option<Vec<String>>, GenError> {
        let tag = args
            .first()
            .ok_or_else(|| dir_err("type needs a tag argument", None))?;
        let first = block
            .first()
            .ok_or_else(|| dir_err("type needs its struct line in the block", None))?;
        let tokens: Vec<&str> = first.split_whitespace().collect();
        let name = tokens
            .get(1)
            .ok_or_else(|| dir_err("type struct line has no name", Some(first)))?;
        let colon = tokens
            .iter()
            .position(|t| *t == ":")
            .ok_or_else(|| dir_err("type struct line has no base clause", Some(first)))?;
        let base = tokens[colon + 1..tokens.len().saturating_sub(1)].join(" ");

        let mut out = vec![
            first.trim().to_string(),
            "    static auto create (ArgVec const&,Type const* =nullptr) -> Value;".to_string(),
            "    static Lookup const attrs;".to_string(),
            "    static Type info;".to_string(),
            "    auto type () const -> Type const& override { return info; }".to_string(),
            "    void repr (Buffer&) const override;".to_string(),
        ];
        if tag.starts_with('<') {
            // Not constructible from the VM: no factory, no attrs, no repr.
            out.remove(2);
            out.remove(1);
            out.pop();
            self.type_fixed
                .push((tag.clone(), name.to_string(), base));
        } else {
            self.type_exposed
                .push((tag.clone(), name.to_string(), base));
        }
        Ok(Some(out))
    }

    fn type_info(&mut self) -> Result<Option<Vec<String>>, GenError> {
        let mut out = Vec::new();
        self.type_fixed.sort();
        for (tag, name, _) in &self.type_fixed {
            out.push(format!("Type {name:>12}::info (Q(0,\"{tag}\"));"));
        }
        out.push(String::new());
        self.type_exposed.sort();
        for (tag, name, _) in &self.type_exposed {
            out.push(format!(
                "Type {name:>8}::info ({:<15}, {name:>6}::create, &{name}::attrs);",
                format!("Q(0,\"{tag}\")")
            ));
        }
        Ok(Some(out))
    }

    fn type_builtin(&mut self) -> Result<Option<Vec<String>>, GenError> {
        self.type_exposed.sort();
        Ok(Some(
            self.type_exposed
                .iter()
                .map(|(tag, name, _)| {
                    format!("{{ {:<15} {name}::info }},", format!("Q(0,\"{tag}\"),"))
                })
                .collect(),
        ))
    }

    fn module(&mut self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let name = args
            .first()
            .ok_or_else(|| dir_err("module needs a name", None))?;
        self.module = name.clone();
        self.funs.insert(name.clone(), Vec::new());
        self.meths.insert(name.clone(), Vec::new());
        Ok(Some(Vec::new()))
    }

    fn module_end(&mut self) -> Result<Option<Vec<String>>, GenError> {
        if self.module.is_empty() {
            return Err(dir_err("module-end without an open module", None));
        }
        let name = std::mem::take(&mut self.module);
        Ok(Some(vec![
            format!("static Lookup const {name}_attrs ({name}_map);"),
            format!("Module ext_{name} (Q(0,\"{name}\"), {name}_attrs);"),
        ]))
    }

    fn wrap(&mut self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let typ = args
            .first()
            .ok_or_else(|| dir_err("wrap needs a type name", None))?;
        self.funs.entry(typ.clone()).or_default();
        self.meths
            .entry(typ.clone())
            .or_default()
            .extend(args[1..].iter().cloned());
        Ok(None)
    }

    fn wrappers(&mut self) -> Result<Option<Vec<String>>, GenError> {
        let module = self.module.clone();
        let mut out = Vec::new();

        if let Some(funs) = self.funs.get_mut(&module) {
            funs.sort();
            for f in funs.iter() {
                out.push(format!("static Function const fo_{f} (f_{f});"));
            }
        }

        let types: Vec<String> = if !module.is_empty() {
            vec![module.clone()]
        } else {
            let mut keys: Vec<String> = self.meths.keys().cloned().collect();
            keys.sort();
            keys
        };

        for t in &types {
            let l = t.to_lowercase();
            if let Some(meths) = self.meths.get_mut(t) {
                meths.sort();
            }
            let meths = self.meths.get(t).cloned().unwrap_or_default();
            for f in &meths {
                out.push(String::new());
                out.push(format!("static auto m_{l}_{f} = Method::wrap(&{t}::{f});"));
                out.push(format!("static Method const mo_{l}_{f} (m_{l}_{f});"));
            }
            if t.is_empty() {
                continue;
            }
            out.push(String::new());
            out.push(format!("static Lookup::Item const {l}_map [] = {{"));
            for f in self.funs.get(t).cloned().unwrap_or_default() {
                if !module.is_empty() {
                    out.push(format!("    {{ Q(0,\"{f}\"), fo_{f} }},"));
                } else {
                    out.push(format!("    {{ Q(0,\"{f}\"), fo_{l}_{f} }},"));
                }
            }
            for f in &meths {
                out.push(format!("    {{ Q(0,\"{f}\"), mo_{l}_{f} }},"));
            }
            // A named module's map stays open: hand-written entries follow
            // the //CG> line and module-end closes the table.
            if module.is_empty() {
                out.push("};".to_string());
                out.push(format!("Lookup const {t}::attrs ({l}_map, sizeof {l}_map);"));
            }
        }

        self.funs.remove(&module);
        self.meths.remove(&module);
        Ok(Some(out))
    }

    fn exceptions(&mut self, block: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let mut out = Vec::new();
        for line in block {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(dir_err("malformed exception row", Some(line)));
            }
            let name = fields[0].trim_matches(',');
            let base = fields[2];
            let id = self.exc_hier.len() as i32;
            let base_id = if base == "-" {
                -1
            } else {
                *self.exc_ids.get(base).ok_or_else(|| {
                    GenError::new(GenErrorKind::Reference, "unknown exception base", Some(base))
                })?
            };
            self.exc_ids.insert(name.to_string(), id);
            self.exc_hier.push(format!(
                "{{ {:<29} {base_id:2} }}, // {id:2} -> {base}",
                format!("Q(0,\"{name}\"),")
            ));
            self.exc_funs
                .push(format!("static auto e_{name} (ArgVec const& args) -> Value {{"));
            self.exc_funs
                .push(format!("    return Exception::create(E::{name}, args);"));
            self.exc_funs.push("}".to_string());
            self.exc_funs
                .push(format!("static Function const fo_{name} (e_{name});"));
            self.exc_defs.push(format!(
                "{{ {:<29} fo_{name} }},",
                format!("Q(0,\"{name}\"),")
            ));
            out.push(format!("{:<20} // {base}", format!("{name},")));
        }
        Ok(Some(out))
    }

    fn exception_emit(&self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        match args.first().map(String::as_str).unwrap_or("h") {
            "h" => Ok(Some(self.exc_hier.clone())),
            "f" => Ok(Some(self.exc_funs.clone())),
            "d" => Ok(Some(self.exc_defs.clone())),
            other => Err(dir_err("exception-emit selector must be h, f or d", Some(other))),
        }
    }

    fn sizes(&self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        Ok(Some(
            args.iter()
                .map(|t| format!("printf(\"%4d = sizeof {t}\\n\", (int) sizeof ({t}));"))
                .collect(),
        ))
    }

    fn tag(&self, args: &[String]) -> Result<Option<Vec<String>>, GenError> {
        let text = args.join(" ");
        let pad = 76usize.saturating_sub(text.len());
        Ok(Some(vec![format!("{}// {text}", " ".repeat(pad))]))
    }
}

impl Pass for ExpandPass {
    fn name(&self) -> &'static str {
        "expand"
    }

    fn begin_file(&mut self, _ctx: &mut GenContext, _path: &Path) {
        self.flags.clear();
    }

    fn on_directive(
        &mut self,
        ctx: &mut GenContext,
        node: &DirectiveNode,
    ) -> Result<Option<Vec<String>>, GenError> {
        let Some(kind) = DirectiveKind::lookup(&node.command) else {
            ctx.note_unknown(&node.command);
            return Ok(None);
        };
        match kind {
            DirectiveKind::Args => self.args(&node.args),
            DirectiveKind::Bind => self.bind(&node.args),
            DirectiveKind::Binops => self.binops(ctx, &node.args),
            DirectiveKind::Exceptions => self.exceptions(&node.block),
            DirectiveKind::ExceptionEmit => self.exception_emit(&node.args),
            DirectiveKind::Kwargs => self.kwargs(&node.args),
            DirectiveKind::Module => self.module(&node.args),
            DirectiveKind::ModuleEnd => self.module_end(),
            DirectiveKind::Off => {
                for flag in &node.args {
                    self.flags.remove(flag);
                }
                Ok(None)
            }
            DirectiveKind::On => {
                for flag in &node.args {
                    self.flags.insert(flag.clone());
                }
                Ok(None)
            }
            DirectiveKind::Op => self.op(&node.block, &node.args),
            DirectiveKind::OpEmit => self.op_emit(&node.args),
            DirectiveKind::OpInit => {
                self.opdefs.clear();
                self.opmulti.clear();
                Ok(None)
            }
            DirectiveKind::Opcodes => self.opcodes(ctx, &node.args),
            // Handled by the qstr pass.
            DirectiveKind::Qstr | DirectiveKind::QstrEmit => Ok(None),
            DirectiveKind::Sizes => self.sizes(&node.args),
            DirectiveKind::Tag => self.tag(&node.args),
            DirectiveKind::Type => self.type_header(&node.block, &node.args),
            DirectiveKind::TypeBuiltin => self.type_builtin(),
            DirectiveKind::TypeInfo => self.type_info(),
            DirectiveKind::Wrap => self.wrap(&node.args),
            DirectiveKind::Wrappers => self.wrappers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, Node};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn ctx() -> GenContext {
        GenContext::new(false)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn run_one(pass: &mut ExpandPass, text: &str) -> Option<Vec<String>> {
        let nodes = parse(text).expect("parse");
        let mut ctx = ctx();
        for node in &nodes {
            if let Node::Directive(dir) = node {
                return pass.on_directive(&mut ctx, dir).expect("handler");
            }
        }
        panic!("no directive in input");
    }

    fn unique_temp_file(tag: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("cgforge-expand-{tag}-{now}"));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir.join("ref.h")
    }

    #[test]
    fn args_emits_decls_parse_call_and_guard() {
        let pass = ExpandPass::new();
        let out = pass.args(&strings(&["x", "y:i"])).unwrap().unwrap();
        assert_eq!(
            out,
            strings(&[
                "Value x;",
                "int y;",
                "auto ainfo = args.parse(\"vi\",&x,&y);",
                "if (ainfo.isObj()) return ainfo;",
            ])
        );
    }

    #[test]
    fn args_pointer_types_get_star_prefix() {
        let pass = ExpandPass::new();
        let out = pass.args(&strings(&["?", "name:s", "obj:o"])).unwrap().unwrap();
        assert_eq!(
            out,
            strings(&[
                "char const *name;",
                "Object *obj;",
                "auto ainfo = args.parse(\"?so\",&name,&obj);",
                "if (ainfo.isObj()) return ainfo;",
            ])
        );
    }

    #[test]
    fn bind_emits_wrapper_signature() {
        let mut pass = ExpandPass::new();
        let out = pass.bind(&strings(&["foo", "a", "b:i"])).unwrap().unwrap();
        assert_eq!(out, strings(&["static auto f_foo (Value a, int b) -> Value {"]));
    }

    #[test]
    fn bind_optional_marker_adds_argvec_parameter() {
        let mut pass = ExpandPass::new();
        let out = pass.bind(&strings(&["bar", "?", "x:o"])).unwrap().unwrap();
        assert_eq!(
            out,
            strings(&["static auto f_bar (ArgVec const& args, Object* x) -> Value {"])
        );
    }

    #[test]
    fn bind_records_function_under_current_module() {
        let mut pass = ExpandPass::new();
        pass.module(&strings(&["sys"])).unwrap();
        pass.bind(&strings(&["gc"])).unwrap();
        assert_eq!(pass.funs["sys"], vec!["gc"]);
    }

    #[test]
    fn kwargs_emits_option_matching_loop() {
        let pass = ExpandPass::new();
        let out = pass.kwargs(&strings(&["a", "b"])).unwrap().unwrap();
        assert_eq!(
            out,
            strings(&[
                "Value a, b;",
                "for (int i = 0; i < args.kwNum(); ++i) {",
                "    auto k = args.kwKey(i), v = args.kwVal(i);",
                "    switch (k.asQid()) {",
                "        case Q(0,\"a\"): a = v; break;",
                "        case Q(0,\"b\"): b = v; break;",
                "        default: return {E::TypeError, \"unknown option\", k};",
                "    }",
                "}",
            ])
        );
    }

    #[test]
    fn op_emits_opener_and_accumulates_dispatch_case() {
        let mut pass = ExpandPass::new();
        let out = pass
            .op(&strings(&["void opLoadConst (int arg) {"]), &strings(&["v"]))
            .unwrap()
            .unwrap();
        assert_eq!(out, strings(&["void opLoadConst (int arg) {"]));
        assert_eq!(
            pass.opdefs,
            strings(&[
                "case Op::LoadConst: {",
                "    int arg = fetchV();",
                "    opLoadConst(arg);",
                "    break;",
                "}",
            ])
        );
    }

    #[test]
    fn op_without_type_has_no_argument_plumbing() {
        let mut pass = ExpandPass::new();
        let out = pass
            .op(&strings(&["void opNop () {"]), &[])
            .unwrap()
            .unwrap();
        assert_eq!(out, strings(&["void opNop () {"]));
        assert_eq!(
            pass.opdefs,
            strings(&["case Op::Nop:", "    opNop();", "    break;"])
        );
    }

    #[test]
    fn op_signed_type_adds_loop_check() {
        let mut pass = ExpandPass::new();
        pass.op(&strings(&["void opJump (int arg) {"]), &strings(&["s"]))
            .unwrap();
        assert!(pass.opdefs.contains(&"    loopCheck(arg);".to_string()));
        assert!(pass
            .opdefs
            .contains(&"    int arg = fetchO()-0x8000;".to_string()));
    }

    #[test]
    fn op_multi_accumulates_range_dispatch() {
        let mut pass = ExpandPass::new();
        pass.op(
            &strings(&["void opLoadFast (uint32_t arg) {"]),
            &strings(&["m", "16"]),
        )
        .unwrap();
        assert_eq!(
            pass.opmulti,
            strings(&[
                "if ((uint32_t) (_ip[-1] - Op::LoadFast) < 16) {",
                "    uint32_t arg = _ip[-1] - Op::LoadFast;",
                "    opLoadFast(arg);",
                "    break;",
                "}",
            ])
        );
    }

    #[test]
    fn op_print_flag_inserts_trace_printf() {
        let mut pass = ExpandPass::new();
        pass.flags.insert("op:print".to_string());
        pass.op(&strings(&["void opPush (Q arg) {"]), &strings(&["q"]))
            .unwrap();
        assert!(pass
            .opdefs
            .contains(&"    printf(\"Push %s\\n\", (char const*) arg);".to_string()));
    }

    #[test]
    fn op_emit_returns_accumulated_sections() {
        let mut pass = ExpandPass::new();
        pass.op(&strings(&["void opNop () {"]), &[]).unwrap();
        let defs = pass.op_emit(&strings(&["d"])).unwrap().unwrap();
        assert_eq!(defs.len(), 3);
        let multi = pass.op_emit(&strings(&["m"])).unwrap().unwrap();
        assert!(multi.is_empty());
    }

    #[test]
    fn op_emit_without_known_selector_keeps_node_unchanged() {
        let mut pass = ExpandPass::new();
        pass.op(&strings(&["void opNop () {"]), &[]).unwrap();
        assert!(pass.op_emit(&[]).unwrap().is_none());
        assert!(pass.op_emit(&strings(&["x"])).unwrap().is_none());
    }

    #[test]
    fn opcodes_parses_base_plus_offset_defines_sorted() {
        let path = unique_temp_file("opcodes");
        std::fs::write(
            &path,
            "#define MP_BC_BASE_RESERVED (0x10) // base\n\
             #define MP_BC_LOAD_CONST_NONE (MP_BC_BASE_RESERVED + 0x01)\n\
             #define MP_BC_LOAD_CONST_FALSE (MP_BC_BASE_RESERVED + 0x00)\n\
             not a define\n",
        )
        .expect("write header");
        let pass = ExpandPass::new();
        let mut ctx = ctx();
        let out = pass
            .opcodes(&mut ctx, &[path.to_string_lossy().to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            vec![
                format!("{:<22} = 0x10,", "LoadConstFalse"),
                format!("{:<22} = 0x11,", "LoadConstNone"),
            ]
        );
    }

    #[test]
    fn opcodes_missing_file_keeps_node_unchanged() {
        let pass = ExpandPass::new();
        let mut ctx = ctx();
        let out = pass
            .opcodes(&mut ctx, &strings(&["no/such/file.h"]))
            .unwrap();
        assert!(out.is_none());
        assert_eq!(ctx.notes.len(), 1);
    }

    #[test]
    fn binops_collects_and_wraps_macro_names() {
        let path = unique_temp_file("binops");
        std::fs::write(
            &path,
            "MP_BINARY_OP_LESS x\nMP_BINARY_OP_MORE x\nMP_BINARY_OP_EQUAL x\nother\n",
        )
        .expect("write header");
        let pass = ExpandPass::new();
        let mut ctx = ctx();
        let args = vec![path.to_string_lossy().to_string(), "2".to_string()];
        let out = pass.binops(&mut ctx, &args).unwrap().unwrap();
        assert_eq!(out, strings(&["Less More"]));
    }

    #[test]
    fn type_emits_full_header_for_exposed_type() {
        let mut pass = ExpandPass::new();
        let out = pass
            .type_header(&strings(&["struct Array : Object {"]), &strings(&["array"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            strings(&[
                "struct Array : Object {",
                "    static auto create (ArgVec const&,Type const* =nullptr) -> Value;",
                "    static Lookup const attrs;",
                "    static Type info;",
                "    auto type () const -> Type const& override { return info; }",
                "    void repr (Buffer&) const override;",
            ])
        );
        assert_eq!(pass.type_exposed.len(), 1);
    }

    #[test]
    fn uninstantiable_type_omits_factory_and_repr() {
        let mut pass = ExpandPass::new();
        let out = pass
            .type_header(
                &strings(&["struct Object : Obj {"]),
                &strings(&["<object>"]),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            strings(&[
                "struct Object : Obj {",
                "    static Type info;",
                "    auto type () const -> Type const& override { return info; }",
            ])
        );
        assert_eq!(pass.type_fixed.len(), 1);
    }

    #[test]
    fn type_info_emits_both_sections_sorted() {
        let mut pass = ExpandPass::new();
        pass.type_header(&strings(&["struct B : Obj {"]), &strings(&["<b>"]))
            .unwrap();
        pass.type_header(&strings(&["struct A : Obj {"]), &strings(&["a"]))
            .unwrap();
        let out = pass.type_info().unwrap().unwrap();
        assert_eq!(out[0], format!("Type {:>12}::info (Q(0,\"<b>\"));", "B"));
        assert_eq!(out[1], "");
        assert!(out[2].contains("A::create"));
    }

    #[test]
    fn wrappers_for_named_module_leaves_map_open() {
        let mut pass = ExpandPass::new();
        pass.module(&strings(&["sys"])).unwrap();
        pass.bind(&strings(&["gcmax"])).unwrap();
        pass.bind(&strings(&["gc"])).unwrap();
        let out = pass.wrappers().unwrap().unwrap();
        assert_eq!(
            out,
            strings(&[
                "static Function const fo_gc (f_gc);",
                "static Function const fo_gcmax (f_gcmax);",
                "",
                "static Lookup::Item const sys_map [] = {",
                "    { Q(0,\"gc\"), fo_gc },",
                "    { Q(0,\"gcmax\"), fo_gcmax },",
            ])
        );
        // module-end closes the table with hand-written entries in between.
        let end = pass.module_end().unwrap().unwrap();
        assert_eq!(
            end,
            strings(&[
                "static Lookup const sys_attrs (sys_map);",
                "Module ext_sys (Q(0,\"sys\"), sys_attrs);",
            ])
        );
    }

    #[test]
    fn wrap_records_methods_for_wrappers() {
        let mut pass = ExpandPass::new();
        pass.module(&strings(&["machine"])).unwrap();
        pass.wrap(&strings(&["machine", "enable", "disable"])).unwrap();
        let out = pass.wrappers().unwrap().unwrap();
        assert!(out.contains(&"static auto m_machine_disable = Method::wrap(&machine::disable);".to_string()));
        assert!(out.contains(&"    { Q(0,\"enable\"), mo_machine_enable },".to_string()));
    }

    #[test]
    fn exceptions_assign_sequential_ids_and_resolve_bases() {
        let mut pass = ExpandPass::new();
        let out = pass
            .exceptions(&strings(&[
                "BaseException,       // -",
                "Exception,           // BaseException",
            ]))
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            strings(&[
                "BaseException,       // -",
                "Exception,           // BaseException",
            ])
        );
        let hier = pass.exception_emit(&strings(&["h"])).unwrap().unwrap();
        assert_eq!(hier[0], format!("{{ {:<29} -1 }}, //  0 -> -", "Q(0,\"BaseException\"),"));
        assert_eq!(
            hier[1],
            format!("{{ {:<29}  0 }}, //  1 -> BaseException", "Q(0,\"Exception\"),")
        );
        let funs = pass.exception_emit(&strings(&["f"])).unwrap().unwrap();
        assert_eq!(funs.len(), 8);
        assert_eq!(funs[1], "    return Exception::create(E::BaseException, args);");
    }

    #[test]
    fn exceptions_reject_unknown_base() {
        let mut pass = ExpandPass::new();
        let err = pass
            .exceptions(&strings(&["Weird,    // NoSuchBase"]))
            .expect_err("base must already be defined");
        assert_eq!(err.kind(), GenErrorKind::Reference);
        assert_eq!(err.message(), "unknown exception base: NoSuchBase");
    }

    #[test]
    fn sizes_and_tag_emit_formatted_lines() {
        let pass = ExpandPass::new();
        let out = pass.sizes(&strings(&["Value", "Object"])).unwrap().unwrap();
        assert_eq!(
            out[0],
            "printf(\"%4d = sizeof Value\\n\", (int) sizeof (Value));"
        );
        let out = pass.tag(&strings(&["mark"])).unwrap().unwrap();
        assert_eq!(out[0].len(), 76 + 3);
        assert!(out[0].ends_with("// mark"));
    }

    #[test]
    fn on_off_toggle_flags_and_unknown_commands_are_tallied() {
        let mut pass = ExpandPass::new();
        assert!(run_one(&mut pass, "//CG: on op:print\n").is_none());
        assert!(pass.flags.contains("op:print"));
        assert!(run_one(&mut pass, "//CG: off op:print\n").is_none());
        assert!(pass.flags.is_empty());

        let nodes = parse("//CG: no-such-command x\n").expect("parse");
        let mut ctx = GenContext::new(false);
        if let Node::Directive(dir) = &nodes[0] {
            let out = pass.on_directive(&mut ctx, dir).expect("dispatch");
            assert!(out.is_none());
        }
        assert_eq!(ctx.unknown.get("no-such-command"), Some(&1));
    }

    #[test]
    fn flags_reset_per_file() {
        let mut pass = ExpandPass::new();
        let mut ctx = GenContext::new(false);
        pass.flags.insert("op:print".to_string());
        pass.begin_file(&mut ctx, Path::new("next.cpp"));
        assert!(pass.flags.is_empty());
    }
}
