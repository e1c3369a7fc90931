//! 実行ハーネス
//!
//! スクリプトの正規化、単一ワーカーでの解析・実行ループ、
//! 完了チャネル、そして全コマンドが共有する abort プロトコル。
//! 並行実行はなく、呼び出し側はワーカーの完了まで同期的に待つ。

use std::sync::mpsc;
use std::thread;

use super::command::Cmd;
use super::session::EditSession;
use super::ScriptParser;
use crate::buffer::BufferId;
use crate::error::{Result, TsumugiError};

/// エグゼキュータの継続シグナル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// 次のコマンドへ進む
    Continue,
    /// ワーカーループを止める
    Halt,
}

/// ハーネスが消費するホスト側の能力
///
/// バッファ群への prepare/truncate/apply のブロードキャスト、
/// 実行状態のリセット、対象ビューの束縛、コマンドの実行。
/// レンジ解決はエグゼキュータの内側で行われるため、ここには
/// 現れない。
pub trait EditHost {
    /// 全バッファに準備シグナルを送る（保留編集の確定と
    /// 編集ログ基準のリセット）
    fn prepare_all(&mut self);

    /// 全バッファの編集ログを破棄する（abort 時）
    fn truncate_all(&mut self);

    /// 各バッファの編集ログを反映し、選択とフラグを同期する
    fn apply_all(&mut self);

    /// ループ入れ子等のスクリプト毎の実行状態をリセットする
    fn reset_exec(&mut self);

    /// 既定のコマンド対象を束縛する（束縛ビューが無ければ None）
    fn set_target(&mut self, target: Option<BufferId>);

    /// 解析済みコマンドを1つ実行する
    fn execute(&mut self, cmd: &Cmd) -> Result<Flow>;
}

/// スクリプトを対象ビューに対して実行する
///
/// 空入力は何もしない。失敗はスクリプト全体の破棄を意味し、
/// どのバッファにも部分適用を残さない。返り値のエラーは呼び出し
/// 側が警告として表示する非致命のメッセージ。内部不変条件の違反
/// （文法実装のバグ）は panic のままワーカー境界を突き抜ける。
pub fn run_script<H: EditHost + Send>(
    host: &mut H,
    session: &mut EditSession,
    target: Option<BufferId>,
    raw: &str,
) -> Result<()> {
    if raw.is_empty() {
        return Ok(());
    }
    log::debug!("edit script: {} chars", raw.chars().count());

    host.prepare_all();
    host.set_target(target);
    host.reset_exec();

    let (tx, rx) = mpsc::channel::<Option<TsumugiError>>();
    {
        let host = &mut *host;
        let session = &mut *session;
        thread::scope(|scope| {
            scope.spawn(move || {
                let outcome = worker(&mut *host, &mut *session, raw);
                let message = match outcome {
                    Ok(()) => None,
                    Err(err) => {
                        // 破棄はワーカー境界を離れる前に必ず走らせる
                        host.truncate_all();
                        Some(err)
                    }
                };
                let _ = tx.send(message);
            });
        });
    }
    // ワーカーの完了報告を同期的に待ってから反映に進む
    let warning = rx.recv().ok().flatten();

    host.apply_all();

    match warning {
        Some(err) => {
            log::debug!("edit aborted: {err}");
            Err(err)
        }
        None => Ok(()),
    }
}

/// ワーカーループ: 1コマンドずつ解析と実行を交互に行う
fn worker<H: EditHost>(host: &mut H, session: &mut EditSession, script: &str) -> Result<()> {
    let mut parser = ScriptParser::new(session, script);
    loop {
        let cmd = match parser.parse_cmd(0)? {
            Some(cmd) => cmd,
            None => break,
        };
        if host.execute(&cmd)? == Flow::Halt {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::command::CmdC;

    /// 実行を記録するだけの最小ホスト
    #[derive(Default)]
    struct RecordingHost {
        prepared: usize,
        truncated: usize,
        applied: usize,
        executed: Vec<CmdC>,
        fail_on: Option<CmdC>,
    }

    impl EditHost for RecordingHost {
        fn prepare_all(&mut self) {
            self.prepared += 1;
        }
        fn truncate_all(&mut self) {
            self.truncated += 1;
        }
        fn apply_all(&mut self) {
            self.applied += 1;
        }
        fn reset_exec(&mut self) {}
        fn set_target(&mut self, _target: Option<BufferId>) {}
        fn execute(&mut self, cmd: &Cmd) -> Result<Flow> {
            if Some(cmd.cmdc) == self.fail_on {
                return Err(crate::error::ExecError::NoMatch.into());
            }
            self.executed.push(cmd.cmdc);
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn empty_script_is_a_no_op() {
        let mut host = RecordingHost::default();
        let mut session = EditSession::new();
        run_script(&mut host, &mut session, None, "").unwrap();
        assert_eq!(host.prepared, 0);
        assert_eq!(host.applied, 0);
    }

    #[test]
    fn commands_run_in_order_and_apply_follows() {
        let mut host = RecordingHost::default();
        let mut session = EditSession::new();
        run_script(&mut host, &mut session, None, "p\nd\n").unwrap();
        assert_eq!(host.executed, vec![CmdC::Ch('p'), CmdC::Ch('d')]);
        assert_eq!(host.prepared, 1);
        assert_eq!(host.applied, 1);
        assert_eq!(host.truncated, 0);
    }

    #[test]
    fn parse_error_truncates_and_surfaces_warning() {
        let mut host = RecordingHost::default();
        let mut session = EditSession::new();
        let err = run_script(&mut host, &mut session, None, "p\nz\n").unwrap_err();
        assert_eq!(err.to_string(), "unknown command z");
        // 先行コマンドは実行済みでも、ログは破棄され apply は走る
        assert_eq!(host.truncated, 1);
        assert_eq!(host.applied, 1);
    }

    #[test]
    fn executor_error_aborts_the_script() {
        let mut host = RecordingHost {
            fail_on: Some(CmdC::Ch('d')),
            ..Default::default()
        };
        let mut session = EditSession::new();
        let err = run_script(&mut host, &mut session, None, "p\nd\np\n").unwrap_err();
        assert_eq!(err.to_string(), "no match for regexp");
        assert_eq!(host.executed, vec![CmdC::Ch('p')]);
        assert_eq!(host.truncated, 1);
    }
}
