//! レンジ解決
//!
//! アドレス木を生きたバッファ内容に対する具体的な文字レンジへ
//! 解決する。カンマ（独立）とセミコロン（逐次）の意味論、
//! 折り返しつきの前方・後方検索、`"` によるバッファ切り替えを
//! ここで実装する。

use regex::Regex;

use crate::buffer::{BufferId, Range, TextBuffer, Workspace};
use crate::edit::address::{Addr, AddrKind};
use crate::error::{ExecError, Result, TsumugiError};

/// 解決済みアドレス（バッファとその中のレンジ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddr {
    pub buf: BufferId,
    pub range: Range,
}

/// 正規表現のコンパイル（行境界マッチを既定で有効にする）
pub(crate) fn compile(pattern: &str) -> std::result::Result<Regex, ExecError> {
    Regex::new(&format!("(?m){pattern}")).map_err(|e| ExecError::BadRegexp(e.to_string()))
}

fn get(ws: &Workspace, id: BufferId) -> Result<&TextBuffer> {
    ws.buffer(id)
        .ok_or_else(|| TsumugiError::from(ExecError::NoCurrentBuffer))
}

/// アドレス木をレンジへ解決する
///
/// `buf`/`dot` は評価の起点。複合アドレスの省略された左辺は行0、
/// 右辺はバッファ末尾になる。
pub fn resolve_addr(
    ws: &Workspace,
    addr: &Addr,
    buf: BufferId,
    dot: Range,
) -> Result<ResolvedAddr> {
    match addr.kind {
        AddrKind::Comma | AddrKind::Semicolon => {
            let left = match &addr.left {
                Some(l) => resolve_addr(ws, l, buf, dot)?,
                None => ResolvedAddr { buf, range: Range::empty(0) },
            };
            // 逐次レンジは左の結果を dot にして右を評価する
            let right_dot = if addr.kind == AddrKind::Semicolon {
                left.range
            } else if left.buf == buf {
                dot
            } else {
                get(ws, left.buf)?.dot
            };
            let right = match &addr.next {
                Some(r) => resolve_addr(ws, r, left.buf, right_dot)?,
                None => ResolvedAddr {
                    buf: left.buf,
                    range: Range::empty(get(ws, left.buf)?.len()),
                },
            };
            if right.buf != left.buf {
                return Err(ExecError::CrossFileRange.into());
            }
            if right.range.q1 < left.range.q0 {
                return Err(ExecError::AddressOutOfRange.into());
            }
            Ok(ResolvedAddr {
                buf: right.buf,
                range: Range::new(left.range.q0, right.range.q1),
            })
        }
        _ => resolve_chain(ws, addr, buf, dot),
    }
}

/// 単純アドレスの連なりを左から右へ評価する
fn resolve_chain(
    ws: &Workspace,
    head: &Addr,
    buf: BufferId,
    dot: Range,
) -> Result<ResolvedAddr> {
    let mut cur_buf = buf;
    let mut val = dot;
    let mut op: Option<AddrKind> = None;
    let mut node = Some(head);

    while let Some(a) = node {
        match a.kind {
            AddrKind::Plus | AddrKind::Minus => {
                // 連続する演算子にはオペランド1行を補う
                if let Some(o) = op.take() {
                    val = relative_lines(get(ws, cur_buf)?, o, val, 1)?;
                }
                op = Some(a.kind);
            }
            AddrKind::FileScope => {
                let pattern = a.re.as_deref().unwrap_or_default();
                cur_buf = match_buffer(ws, pattern)?;
                val = get(ws, cur_buf)?.dot;
            }
            _ => {
                let b = get(ws, cur_buf)?;
                val = match op.take() {
                    Some(o) => relative_operand(b, o, val, a)?,
                    None => absolute_operand(b, val, a)?,
                };
            }
        }
        node = a.next.as_deref();
    }
    if let Some(o) = op {
        val = relative_lines(get(ws, cur_buf)?, o, val, 1)?;
    }
    Ok(ResolvedAddr { buf: cur_buf, range: val })
}

/// 絶対位置としての原子アドレス
fn absolute_operand(b: &TextBuffer, val: Range, a: &Addr) -> Result<Range> {
    match a.kind {
        AddrKind::Line => b
            .line_range(a.num as usize)
            .ok_or_else(|| ExecError::AddressOutOfRange.into()),
        AddrKind::CharOffset => {
            let n = a.num as usize;
            if n > b.len() {
                return Err(ExecError::AddressOutOfRange.into());
            }
            Ok(Range::empty(n))
        }
        AddrKind::Forward => {
            search_forward(b, a.re.as_deref().unwrap_or_default(), val.q1)
        }
        AddrKind::Backward => {
            search_backward(b, a.re.as_deref().unwrap_or_default(), val.q0)
        }
        AddrKind::Dot => Ok(val),
        AddrKind::End => Ok(Range::empty(b.len())),
        AddrKind::Mark => Ok(b.mark),
        _ => unreachable!("absolute_operand"),
    }
}

/// `+`/`-` の右側としてのオペランド
fn relative_operand(b: &TextBuffer, op: AddrKind, val: Range, a: &Addr) -> Result<Range> {
    match a.kind {
        AddrKind::Line => relative_lines(b, op, val, a.num as usize),
        AddrKind::CharOffset => {
            let n = a.num as usize;
            if op == AddrKind::Plus {
                let p = val.q1 + n;
                if p > b.len() {
                    return Err(ExecError::AddressOutOfRange.into());
                }
                Ok(Range::empty(p))
            } else {
                if n > val.q0 {
                    return Err(ExecError::AddressOutOfRange.into());
                }
                Ok(Range::empty(val.q0 - n))
            }
        }
        AddrKind::Forward | AddrKind::Backward => {
            let origin = if op == AddrKind::Plus { val.q1 } else { val.q0 };
            let pattern = a.re.as_deref().unwrap_or_default();
            if a.kind == AddrKind::Forward {
                search_forward(b, pattern, origin)
            } else {
                search_backward(b, pattern, origin)
            }
        }
        _ => unreachable!("relative_operand"),
    }
}

/// 行単位の相対移動（結果はその行全体）
fn relative_lines(b: &TextBuffer, op: AddrKind, val: Range, n: usize) -> Result<Range> {
    let target = if op == AddrKind::Plus {
        // 行頭にいる位置は前の行の終端として数える
        // （行全体を選択した状態での "+" が次の行を指すように）
        let pos = val.q1;
        let line = if pos == 0 || b.char_at(pos - 1) == Some('\n') {
            b.line_of(pos) - 1
        } else {
            b.line_of(pos)
        };
        line.checked_add(n)
    } else {
        b.line_of(val.q0).checked_sub(n)
    };
    let target = target.ok_or_else(|| TsumugiError::from(ExecError::AddressOutOfRange))?;
    b.line_range(target)
        .ok_or_else(|| ExecError::AddressOutOfRange.into())
}

/// 前方検索（折り返しあり）
fn search_forward(b: &TextBuffer, pattern: &str, from: usize) -> Result<Range> {
    let re = compile(pattern).map_err(TsumugiError::from)?;
    let s = b.content();
    let from_b = char_to_byte(&s, from);
    let m = re
        .find_at(&s, from_b)
        .or_else(|| re.find(&s))
        .ok_or(ExecError::NoMatch)?;
    Ok(Range::new(
        byte_to_char(&s, m.start()),
        byte_to_char(&s, m.end()),
    ))
}

/// 後方検索（折り返しあり）
fn search_backward(b: &TextBuffer, pattern: &str, until: usize) -> Result<Range> {
    let re = compile(pattern).map_err(TsumugiError::from)?;
    let s = b.content();
    let mut before = None;
    let mut last = None;
    for m in re.find_iter(&s) {
        let r = Range::new(byte_to_char(&s, m.start()), byte_to_char(&s, m.end()));
        if r.q1 <= until {
            before = Some(r);
        }
        last = Some(r);
    }
    before.or(last).ok_or_else(|| ExecError::NoMatch.into())
}

/// `"re"` に一致する唯一のバッファを探す
fn match_buffer(ws: &Workspace, pattern: &str) -> Result<BufferId> {
    let re = compile(pattern).map_err(TsumugiError::from)?;
    let mut found = None;
    for b in ws.buffers() {
        if re.is_match(b.name()) {
            if found.is_some() {
                return Err(ExecError::MultipleBufferMatch(pattern.to_string()).into());
            }
            found = Some(b.id());
        }
    }
    found.ok_or_else(|| ExecError::NoBufferMatch(pattern.to_string()).into())
}

pub(crate) fn char_to_byte(s: &str, c: usize) -> usize {
    s.char_indices().nth(c).map(|(i, _)| i).unwrap_or(s.len())
}

pub(crate) fn byte_to_char(s: &str, b: usize) -> usize {
    s[..b].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{parse_script, EditSession};

    fn ws_with(content: &str) -> (Workspace, BufferId) {
        let mut ws = Workspace::new();
        let id = ws.open("sample.txt", content);
        (ws, id)
    }

    /// コマンド "<addr>p" を解析してアドレス木を取り出す
    fn addr_of(script: &str) -> Box<Addr> {
        let mut session = EditSession::new();
        let mut cmds = parse_script(&mut session, script).unwrap();
        cmds.remove(0).addr.unwrap()
    }

    fn resolve(ws: &Workspace, id: BufferId, script: &str) -> Result<ResolvedAddr> {
        let dot = ws.buffer(id).unwrap().dot;
        resolve_addr(ws, &addr_of(script), id, dot)
    }

    #[test]
    fn line_and_char_addresses() {
        let (ws, id) = ws_with("one\ntwo\nthree\n");
        assert_eq!(resolve(&ws, id, "2p\n").unwrap().range, Range::new(4, 8));
        assert_eq!(resolve(&ws, id, "#5p\n").unwrap().range, Range::empty(5));
        assert_eq!(resolve(&ws, id, "0p\n").unwrap().range, Range::empty(0));
        assert_eq!(resolve(&ws, id, "$p\n").unwrap().range, Range::empty(14));
        assert!(resolve(&ws, id, "9p\n").is_err());
    }

    #[test]
    fn comma_and_semicolon_ranges() {
        let (ws, id) = ws_with("one\ntwo\nthree\n");
        assert_eq!(resolve(&ws, id, "1,2p\n").unwrap().range, Range::new(0, 8));
        // 省略された両辺はファイル全体
        assert_eq!(resolve(&ws, id, ",p\n").unwrap().range, Range::new(0, 14));

        // セミコロンは左の結果を dot にして右を評価する
        // （行2の後の最初の 'e' は "three" の中、結果は合成レンジ）
        let r = resolve(&ws, id, "2;/e/p\n").unwrap();
        assert_eq!(r.range, Range::new(4, 12));
    }

    #[test]
    fn relative_line_arithmetic() {
        let (mut ws, id) = ws_with("one\ntwo\nthree\nfour\n");
        ws.buffer_mut(id).unwrap().dot = Range::new(4, 8); // 行2
        assert_eq!(resolve(&ws, id, "+p\n").unwrap().range, Range::new(8, 14));
        assert_eq!(resolve(&ws, id, "-p\n").unwrap().range, Range::new(0, 4));
        assert_eq!(resolve(&ws, id, ".+2p\n").unwrap().range, Range::new(14, 19));
        assert_eq!(resolve(&ws, id, "+#3p\n").unwrap().range, Range::empty(11));
        assert!(resolve(&ws, id, "-9p\n").is_err());
    }

    #[test]
    fn implicit_plus_searches_from_line_end() {
        let (ws, id) = ws_with("one two\nthree two\n");
        // "1/two/" は行1の末尾から前方検索する
        let r = resolve(&ws, id, "1/two/p\n").unwrap();
        assert_eq!(r.range, Range::new(14, 17));
    }

    #[test]
    fn searches_wrap_around() {
        let (mut ws, id) = ws_with("alpha\nbeta\ngamma\n");
        ws.buffer_mut(id).unwrap().dot = Range::new(11, 16); // gamma
        let r = resolve(&ws, id, "/beta/p\n").unwrap();
        assert_eq!(r.range, Range::new(6, 10));

        ws.buffer_mut(id).unwrap().dot = Range::new(0, 5); // alpha
        let r = resolve(&ws, id, "?gamma?p\n").unwrap();
        assert_eq!(r.range, Range::new(11, 16));
    }

    #[test]
    fn missing_search_is_reported() {
        let (ws, id) = ws_with("abc\n");
        let err = resolve(&ws, id, "/zzz/p\n").unwrap_err();
        assert_eq!(err.to_string(), "no match for regexp");
    }

    #[test]
    fn file_scope_switches_buffer() {
        let mut ws = Workspace::new();
        let a = ws.open("alpha.txt", "aaa\n");
        let b = ws.open("beta.txt", "bbb\nccc\n");
        let dot = ws.buffer(a).unwrap().dot;
        let r = resolve_addr(&ws, &addr_of("\"beta\"2p\n"), a, dot).unwrap();
        assert_eq!(r.buf, b);
        assert_eq!(r.range, Range::new(4, 8));

        let err = resolve_addr(&ws, &addr_of("\"txt\"p\n"), a, dot).unwrap_err();
        assert_eq!(err.to_string(), "multiple buffer names match txt");
        let err = resolve_addr(&ws, &addr_of("\"zzz\"p\n"), a, dot).unwrap_err();
        assert_eq!(err.to_string(), "no buffer name matches zzz");
    }

    #[test]
    fn reversed_range_is_rejected() {
        let (ws, id) = ws_with("one\ntwo\nthree\n");
        let err = resolve(&ws, id, "3,1p\n").unwrap_err();
        assert_eq!(err.to_string(), "address out of range");
    }
}
