//! コマンド実行
//!
//! コマンド文字ごとのエグゼキュータ群と、ワークスペースへの
//! `EditHost` 実装。編集はすべて編集ログ経由で遅延し、実行中の
//! 失敗は abort 経路（Err の伝播）に合流する。

pub mod resolver;

use std::io::Write;
use std::process::{Command as ShellCommand, Stdio};

use crate::buffer::{BufferId, Range, Workspace};
use crate::edit::address::{Addr, AddrKind};
use crate::edit::command::{lookup, Cmd, CmdC, CmdDesc, DefAddr, ExecCap};
use crate::edit::engine::{EditHost, Flow};
use crate::error::{ExecError, FileError, Result};
use resolver::{byte_to_char, char_to_byte, compile, resolve_addr, ResolvedAddr};

impl EditHost for Workspace {
    fn prepare_all(&mut self) {
        self.editing = true;
        for b in self.buffers_mut() {
            b.editclean = false;
        }
    }

    fn truncate_all(&mut self) {
        for b in self.buffers_mut() {
            b.elog.truncate();
        }
    }

    fn apply_all(&mut self) {
        self.editing = false;
        for b in self.buffers_mut() {
            b.apply_elog();
            if b.editclean {
                b.modified = false;
                b.dirty = false;
            }
            b.clamp_selections();
        }
    }

    fn reset_exec(&mut self) {
        self.loop_depth = 0;
    }

    fn set_target(&mut self, target: Option<BufferId>) {
        self.cur = target;
    }

    fn execute(&mut self, cmd: &Cmd) -> Result<Flow> {
        cmd_exec(self, cmd)
    }
}

/// トークン引数の前後の空白を落とす
fn trim_arg(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t')
}

/// アドレスの先頭がファイルスコープ指定か
fn starts_with_file_scope(addr: Option<&Addr>) -> bool {
    match addr {
        None => false,
        Some(a) => match a.kind {
            AddrKind::Comma | AddrKind::Semicolon => {
                starts_with_file_scope(a.left.as_deref())
            }
            AddrKind::FileScope => true,
            _ => false,
        },
    }
}

/// コマンドを1つ実行する（ブロックとループはここから再帰する）
pub fn cmd_exec(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    if ws.current().is_none() {
        // 対象なしで意味を持つのはバッファ横断系だけ
        let allowed = matches!(
            cmd.cmdc,
            CmdC::Ch('b') | CmdC::Ch('B') | CmdC::Ch('X') | CmdC::Ch('Y')
        ) || (cmd.cmdc == CmdC::Ch('D')
            && cmd.text.as_deref().map(|t| !trim_arg(t).is_empty()).unwrap_or(false))
            || starts_with_file_scope(cmd.addr.as_deref());
        if !allowed {
            return Err(ExecError::NoCurrentBuffer.into());
        }
    }

    if cmd.cmdc == CmdC::Ch('{') {
        return block_cmd(ws, cmd);
    }
    let desc = match lookup(cmd.cmdc) {
        Some(desc) => desc,
        None => unreachable!("cmdexec"),
    };
    match desc.exec {
        ExecCap::Newline => nl_cmd(ws, cmd, desc),
        ExecCap::Append => text_cmd(ws, cmd, desc),
        ExecCap::Insert => text_cmd(ws, cmd, desc),
        ExecCap::Change => text_cmd(ws, cmd, desc),
        ExecCap::Delete => d_cmd(ws, cmd, desc),
        ExecCap::Print => p_cmd(ws, cmd, desc),
        ExecCap::PrintAddr => eq_cmd(ws, cmd, desc),
        ExecCap::Subst => s_cmd(ws, cmd, desc),
        ExecCap::Move => m_cmd(ws, cmd, desc),
        ExecCap::Guard => g_cmd(ws, cmd, desc),
        ExecCap::Loop => x_cmd(ws, cmd, desc),
        ExecCap::FileLoop => x_file_cmd(ws, cmd),
        ExecCap::BufferSwitch => b_cmd(ws, cmd),
        ExecCap::BufferLoad => b_load_cmd(ws, cmd),
        ExecCap::BufferClose => d_close_cmd(ws, cmd),
        ExecCap::Edit => e_cmd(ws, cmd, desc),
        ExecCap::Filename => f_cmd(ws, cmd),
        ExecCap::Write => w_cmd(ws, cmd, desc),
        ExecCap::Undo => u_cmd(ws, cmd),
        ExecCap::Pipe => pipe_cmd(ws, cmd, desc),
    }
}

/// コマンドのアドレスを解決する（無ければディスクリプタの既定）
fn cmd_address(ws: &Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<ResolvedAddr> {
    let base = ws
        .current()
        .or_else(|| ws.buffers().next().map(|b| b.id()))
        .ok_or(ExecError::NoCurrentBuffer)?;
    let dot = ws
        .buffer(base)
        .ok_or(ExecError::NoCurrentBuffer)?
        .dot;
    match &cmd.addr {
        Some(a) => resolve_addr(ws, a, base, dot),
        None => {
            let range = match desc.defaddr {
                DefAddr::All => Range::new(
                    0,
                    ws.buffer(base).ok_or(ExecError::NoCurrentBuffer)?.len(),
                ),
                _ => dot,
            };
            Ok(ResolvedAddr { buf: base, range })
        }
    }
}

/// ブロック: アドレスで dot を設定してから兄弟連鎖を順に実行
fn block_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    if let Some(addr) = &cmd.addr {
        let base = ws
            .current()
            .or_else(|| ws.buffers().next().map(|b| b.id()))
            .ok_or(ExecError::NoCurrentBuffer)?;
        let dot = ws.buffer(base).ok_or(ExecError::NoCurrentBuffer)?.dot;
        let r = resolve_addr(ws, addr, base, dot)?;
        ws.set_current(Some(r.buf));
        if let Some(b) = ws.buffer_mut(r.buf) {
            b.dot = r.range;
        }
    }
    let mut sub = cmd.cmd.as_deref();
    while let Some(c) = sub {
        if cmd_exec(ws, c)? == Flow::Halt {
            return Ok(Flow::Halt);
        }
        sub = c.next.as_deref();
    }
    Ok(Flow::Continue)
}

/// 行末コマンド: アドレス（無ければ行境界へ広げた dot）を選択する
fn nl_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let range = if cmd.addr.is_none() {
        let b = ws.buffer(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
        let dot = b.dot;
        let start = b.line_span(dot.q0).q0;
        let end = if dot.q1 == 0 || b.char_at(dot.q1 - 1) == Some('\n') {
            dot.q1
        } else {
            b.line_span(dot.q1).q1
        };
        Range::new(start, end)
    } else {
        a.range
    };
    if let Some(b) = ws.buffer_mut(a.buf) {
        b.dot = range;
    }
    Ok(Flow::Continue)
}

/// a/i/c: テキストボディを編集ログへ積む
fn text_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let text = cmd.text.as_deref().unwrap_or("");
    let b = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    match desc.exec {
        ExecCap::Append => {
            b.elog.insert(a.range.q1, text)?;
            b.dot = Range::empty(a.range.q1);
        }
        ExecCap::Insert => {
            b.elog.insert(a.range.q0, text)?;
            b.dot = Range::empty(a.range.q0);
        }
        ExecCap::Change => {
            b.elog.replace(a.range.q0, a.range.q1, text)?;
            b.dot = a.range;
        }
        _ => unreachable!("text_cmd"),
    }
    Ok(Flow::Continue)
}

fn d_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let b = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    b.elog.delete(a.range.q0, a.range.q1)?;
    b.dot = Range::empty(a.range.q0);
    Ok(Flow::Continue)
}

fn p_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let slice = ws
        .buffer(a.buf)
        .ok_or(ExecError::NoCurrentBuffer)?
        .slice(a.range);
    ws.push_output(&slice);
    if let Some(b) = ws.buffer_mut(a.buf) {
        b.dot = a.range;
    }
    Ok(Flow::Continue)
}

/// =: レンジのアドレスを出力（既定は行、`=#` で文字オフセット）
fn eq_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let char_mode = trim_arg(cmd.text.as_deref().unwrap_or("")).starts_with('#');
    let b = ws.buffer(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    let Range { q0, q1 } = a.range;
    let addr_str = if char_mode {
        if q1 == q0 {
            format!("#{q0}")
        } else {
            format!("#{q0},#{q1}")
        }
    } else {
        let l0 = b.line_of(q0);
        let l1 = if q1 > q0 { b.line_of(q1 - 1) } else { l0 };
        if l1 == l0 {
            format!("{l0}")
        } else {
            format!("{l0},{l1}")
        }
    };
    let line = format!("{}:{}\n", b.name(), addr_str);
    ws.push_output(&line);
    Ok(Flow::Continue)
}

/// s: レンジ内のマッチを数えながら置換する
fn s_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let pattern = match cmd.re.as_deref() {
        Some(p) => p,
        None => unreachable!("s_cmd"),
    };
    let re = compile(pattern)?;
    let rhs = cmd.text.as_deref().unwrap_or("");

    let content = ws
        .buffer(a.buf)
        .ok_or(ExecError::NoCurrentBuffer)?
        .content();
    let start_b = char_to_byte(&content, a.range.q0);
    let end_b = char_to_byte(&content, a.range.q1);
    let slice = &content[start_b..end_b];

    let mut subs: Vec<(usize, usize, String)> = Vec::new();
    let mut count: i64 = 0;
    for caps in re.captures_iter(slice) {
        let m = caps.get(0).unwrap();
        count += 1;
        if count < cmd.num {
            continue;
        }
        let q0 = a.range.q0 + byte_to_char(slice, m.start());
        let q1 = a.range.q0 + byte_to_char(slice, m.end());
        subs.push((q0, q1, expand_rhs(rhs, &caps)));
        if cmd.flag.is_none() {
            break;
        }
    }
    if subs.is_empty() && ws.loop_depth == 0 {
        return Err(ExecError::NoSubstitution.into());
    }
    let b = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    for (q0, q1, rep) in subs {
        b.elog.replace(q0, q1, &rep)?;
    }
    b.dot = a.range;
    Ok(Flow::Continue)
}

/// 置換側の展開: `&` は全体、`\1`〜`\9` は部分マッチ
fn expand_rhs(rhs: &str, caps: &regex::Captures) -> String {
    let mut out = String::new();
    let mut it = rhs.chars();
    while let Some(c) = it.next() {
        match c {
            '&' => out.push_str(caps.get(0).map(|m| m.as_str()).unwrap_or("")),
            '\\' => match it.next() {
                Some(d @ '0'..='9') => {
                    let idx = d as usize - '0' as usize;
                    if let Some(group) = caps.get(idx) {
                        out.push_str(group.as_str());
                    }
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// m/t: レンジを第二アドレスの直後へ移動・複製する
fn m_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let mtaddr = match cmd.mtaddr.as_deref() {
        Some(mt) => mt,
        None => unreachable!("m_cmd"),
    };
    let dot = ws.buffer(a.buf).ok_or(ExecError::NoCurrentBuffer)?.dot;
    let target = resolve_addr(ws, mtaddr, a.buf, dot)?;
    let text = ws
        .buffer(a.buf)
        .ok_or(ExecError::NoCurrentBuffer)?
        .slice(a.range);
    let p = target.range.q1;

    if cmd.cmdc == CmdC::Ch('m') {
        if target.buf == a.buf && p > a.range.q0 && p < a.range.q1 {
            return Err(ExecError::MoveOverlap.into());
        }
        if target.buf == a.buf {
            let b = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
            // ログは昇順でしか積めないため、前方移動と後方移動で順序を変える
            if p <= a.range.q0 {
                b.elog.insert(p, &text)?;
                b.elog.delete(a.range.q0, a.range.q1)?;
            } else {
                b.elog.delete(a.range.q0, a.range.q1)?;
                b.elog.insert(p, &text)?;
            }
        } else {
            let src = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
            src.elog.delete(a.range.q0, a.range.q1)?;
            let dst = ws.buffer_mut(target.buf).ok_or(ExecError::NoCurrentBuffer)?;
            dst.elog.insert(p, &text)?;
        }
    } else {
        let dst = ws.buffer_mut(target.buf).ok_or(ExecError::NoCurrentBuffer)?;
        dst.elog.insert(p, &text)?;
    }
    if let Some(b) = ws.buffer_mut(target.buf) {
        b.dot = Range::empty(p);
    }
    Ok(Flow::Continue)
}

/// g/v: パターンの一致で入れ子コマンドの実行を条件づける
fn g_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let pattern = match cmd.re.as_deref() {
        Some(p) => p,
        None => unreachable!("g_cmd"),
    };
    let re = compile(pattern)?;
    let slice = ws
        .buffer(a.buf)
        .ok_or(ExecError::NoCurrentBuffer)?
        .slice(a.range);
    let invert = cmd.cmdc == CmdC::Ch('v');
    if re.is_match(&slice) != invert {
        if let Some(b) = ws.buffer_mut(a.buf) {
            b.dot = a.range;
        }
        let sub = match cmd.cmd.as_deref() {
            Some(sub) => sub,
            None => unreachable!("g_cmd body"),
        };
        return cmd_exec(ws, sub);
    }
    Ok(Flow::Continue)
}

/// x/y: マッチごと（またはマッチの隙間ごと）に入れ子コマンドを走らせる
fn x_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let sub = match cmd.cmd.as_deref() {
        Some(sub) => sub,
        None => unreachable!("x_cmd body"),
    };
    let b = ws.buffer(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    let content = b.content();
    let start_b = char_to_byte(&content, a.range.q0);
    let end_b = char_to_byte(&content, a.range.q1);
    let slice = &content[start_b..end_b];

    let ranges: Vec<Range> = match cmd.re.as_deref() {
        Some(pattern) => {
            let re = compile(pattern)?;
            let matches: Vec<Range> = re
                .find_iter(slice)
                .map(|m| {
                    Range::new(
                        a.range.q0 + byte_to_char(slice, m.start()),
                        a.range.q0 + byte_to_char(slice, m.end()),
                    )
                })
                .collect();
            if cmd.cmdc == CmdC::Ch('y') {
                // マッチの間のテキストを対象にする
                let mut gaps = Vec::with_capacity(matches.len() + 1);
                let mut prev = a.range.q0;
                for m in &matches {
                    gaps.push(Range::new(prev, m.q0));
                    prev = m.q1;
                }
                gaps.push(Range::new(prev, a.range.q1));
                gaps
            } else {
                matches
            }
        }
        // パターンなしの x は行ごと
        None => line_ranges(slice, a.range.q0),
    };

    ws.loop_depth += 1;
    for r in ranges {
        if let Some(b) = ws.buffer_mut(a.buf) {
            b.dot = r;
        }
        if let Err(err) = cmd_exec(ws, sub) {
            ws.loop_depth -= 1;
            return Err(err);
        }
    }
    ws.loop_depth -= 1;
    Ok(Flow::Continue)
}

/// スライス内の行レンジ（絶対文字オフセット）
fn line_ranges(slice: &str, base: usize) -> Vec<Range> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    for c in slice.chars() {
        pos += 1;
        if c == '\n' {
            ranges.push(Range::new(base + start, base + pos));
            start = pos;
        }
    }
    if start < pos {
        ranges.push(Range::new(base + start, base + pos));
    }
    ranges
}

/// X/Y: 名前の一致する（しない）バッファごとに入れ子コマンドを走らせる
fn x_file_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    let sub = match cmd.cmd.as_deref() {
        Some(sub) => sub,
        None => unreachable!("X_cmd body"),
    };
    let re = match cmd.re.as_deref() {
        Some(p) => Some(compile(p)?),
        None => None, // パターンなしの X は全バッファ
    };
    let invert = cmd.cmdc == CmdC::Ch('Y');
    let ids = ws.ids();
    ws.loop_depth += 1;
    for id in ids {
        let name_matches = match (&re, ws.buffer(id)) {
            (Some(re), Some(b)) => re.is_match(b.name()),
            (None, Some(_)) => true,
            (_, None) => continue, // ループ中に閉じられたバッファ
        };
        if name_matches != invert {
            ws.set_current(Some(id));
            if let Err(err) = cmd_exec(ws, sub) {
                ws.loop_depth -= 1;
                return Err(err);
            }
        }
    }
    ws.loop_depth -= 1;
    Ok(Flow::Continue)
}

/// b: 名前の一覧から最初に見つかったバッファへ切り替える
fn b_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    let text = cmd.text.as_deref().unwrap_or("");
    let names: Vec<&str> = text.split_whitespace().collect();
    if names.is_empty() {
        return Err(ExecError::NoFileName.into());
    }
    for name in &names {
        if let Some(id) = ws.find_by_name(name) {
            ws.set_current(Some(id));
            return Ok(Flow::Continue);
        }
    }
    Err(ExecError::NoSuchBuffer(names[0].to_string()).into())
}

/// B: ファイル群を読み込んで開く（最初の1つを対象にする）
fn b_load_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    let text = cmd.text.as_deref().unwrap_or("");
    let names: Vec<&str> = text.split_whitespace().collect();
    if names.is_empty() {
        return Err(ExecError::NoFileName.into());
    }
    let mut first_new = None;
    for name in names {
        let path = shellexpand::tilde(name).into_owned();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| FileError::from_io(name, &e))?;
        let id = ws.open(name, &content);
        if first_new.is_none() {
            first_new = Some(id);
        }
    }
    if let Some(id) = first_new {
        ws.set_current(Some(id));
    }
    Ok(Flow::Continue)
}

/// D: 名前つきなら各バッファを、名前なしなら現在のバッファを閉じる
fn d_close_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    let text = cmd.text.as_deref().unwrap_or("");
    let names: Vec<&str> = text.split_whitespace().collect();
    if names.is_empty() {
        let cur = ws.current().ok_or(ExecError::NoCurrentBuffer)?;
        ws.close(cur);
        return Ok(Flow::Continue);
    }
    for name in names {
        let id = ws
            .find_by_name(name)
            .ok_or_else(|| ExecError::NoSuchBuffer(name.to_string()))?;
        ws.close(id);
    }
    Ok(Flow::Continue)
}

/// e/r: ファイル内容で全体（e）またはレンジ（r）を置き換える
fn e_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let arg = trim_arg(cmd.text.as_deref().unwrap_or("")).to_string();
    let b = ws.buffer(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    let name = if arg.is_empty() { b.name().to_string() } else { arg };
    if name.is_empty() {
        return Err(ExecError::NoFileName.into());
    }
    let path = shellexpand::tilde(&name).into_owned();
    let content =
        std::fs::read_to_string(&path).map_err(|e| FileError::from_io(&name, &e))?;
    let b = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    if cmd.cmdc == CmdC::Ch('e') {
        let len = b.len();
        b.elog.replace(0, len, &content)?;
        b.set_name(&name);
    } else {
        b.elog.replace(a.range.q0, a.range.q1, &content)?;
    }
    Ok(Flow::Continue)
}

/// f: 名前を変更し、メニュー行を出力する
fn f_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    let arg = trim_arg(cmd.text.as_deref().unwrap_or("")).to_string();
    let cur = ws.current().ok_or(ExecError::NoCurrentBuffer)?;
    if !arg.is_empty() {
        if let Some(b) = ws.buffer_mut(cur) {
            b.set_name(&arg);
        }
    }
    let line = {
        let b = ws.buffer(cur).ok_or(ExecError::NoCurrentBuffer)?;
        format!(
            "{}{} {}\n",
            if b.modified { '\'' } else { ' ' },
            '.',
            b.name()
        )
    };
    ws.push_output(&line);
    Ok(Flow::Continue)
}

/// w: レンジ（既定はバッファ全体）をファイルへ書き出す
fn w_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let arg = trim_arg(cmd.text.as_deref().unwrap_or("")).to_string();
    let b = ws.buffer(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
    let name = if arg.is_empty() { b.name().to_string() } else { arg };
    if name.is_empty() {
        return Err(ExecError::NoFileName.into());
    }
    let whole = a.range.q0 == 0 && a.range.q1 == b.len();
    let slice = b.slice(a.range);
    let path = shellexpand::tilde(&name).into_owned();
    std::fs::write(&path, slice).map_err(|e| FileError::from_io(&name, &e))?;
    if whole {
        if let Some(b) = ws.buffer_mut(a.buf) {
            b.editclean = true;
        }
    }
    Ok(Flow::Continue)
}

/// u: スクリプト単位のスナップショットを戻す（負数はやり直し）
fn u_cmd(ws: &mut Workspace, cmd: &Cmd) -> Result<Flow> {
    let cur = ws.current().ok_or(ExecError::NoCurrentBuffer)?;
    let b = ws.buffer_mut(cur).ok_or(ExecError::NoCurrentBuffer)?;
    if cmd.num >= 0 {
        for _ in 0..cmd.num {
            if !b.undo() {
                return Err(ExecError::NothingToUndo.into());
            }
        }
    } else {
        for _ in 0..(-cmd.num) {
            if !b.redo() {
                return Err(ExecError::NothingToRedo.into());
            }
        }
    }
    Ok(Flow::Continue)
}

/// </|/>: シェルコマンドとレンジの間で入出力を繋ぐ
fn pipe_cmd(ws: &mut Workspace, cmd: &Cmd, desc: &CmdDesc) -> Result<Flow> {
    let a = cmd_address(ws, cmd, desc)?;
    let shell_line = trim_arg(cmd.text.as_deref().unwrap_or("")).to_string();
    if shell_line.is_empty() {
        return Err(ExecError::Shell("no command".to_string()).into());
    }
    let slice = ws
        .buffer(a.buf)
        .ok_or(ExecError::NoCurrentBuffer)?
        .slice(a.range);

    let give_input = matches!(cmd.cmdc, CmdC::Ch('>') | CmdC::Ch('|'));
    let mut child = ShellCommand::new("sh")
        .arg("-c")
        .arg(&shell_line)
        .stdin(if give_input { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ExecError::Shell(e.to_string()))?;
    if give_input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(slice.as_bytes())
                .map_err(|e| ExecError::Shell(e.to_string()))?;
        }
    }
    let output = child
        .wait_with_output()
        .map_err(|e| ExecError::Shell(e.to_string()))?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    match cmd.cmdc {
        CmdC::Ch('>') => {
            ws.push_output(&stdout);
            if let Some(b) = ws.buffer_mut(a.buf) {
                b.dot = a.range;
            }
        }
        CmdC::Ch('<') | CmdC::Ch('|') => {
            let b = ws.buffer_mut(a.buf).ok_or(ExecError::NoCurrentBuffer)?;
            b.elog.replace(a.range.q0, a.range.q1, &stdout)?;
            b.dot = a.range;
        }
        _ => unreachable!("pipe_cmd"),
    }
    Ok(Flow::Continue)
}
