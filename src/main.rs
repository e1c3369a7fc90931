use anyhow::{bail, Context, Result};
use tsumugi::{run_script, EditSession, Workspace};

/// デバッグ出力マクロ
macro_rules! debug_log {
    ($($arg:tt)*) => {
        if std::env::var("TSUMUGI_DEBUG").is_ok() {
            eprintln!("DEBUG: {}", format!($($arg)*));
        }
    };
}

struct Options {
    script: String,
    files: Vec<String>,
    write_back: bool,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args)?;
    if options.script.is_empty() {
        bail!("no script given (use -e 'script' or -f scriptfile)");
    }

    let mut ws = Workspace::new();
    for file in &options.files {
        let path = shellexpand::tilde(file).into_owned();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {file}"))?;
        ws.open(file, &content);
    }

    let mut session = EditSession::new();
    let target = ws.current();
    debug_log!(
        "running {} char script on {} buffer(s)",
        options.script.chars().count(),
        options.files.len()
    );

    let result = run_script(&mut ws, &mut session, target, &options.script);
    print!("{}", ws.take_output());
    if let Err(err) = result {
        eprintln!("Edit: {err}");
        std::process::exit(1);
    }

    if options.write_back {
        for id in ws.ids() {
            let Some(b) = ws.buffer(id) else { continue };
            if !b.modified {
                continue;
            }
            let name = b.name().to_string();
            let path = shellexpand::tilde(&name).into_owned();
            std::fs::write(&path, b.content())
                .with_context(|| format!("cannot write {name}"))?;
            debug_log!("wrote back {}", name);
        }
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut script = String::new();
    let mut files = Vec::new();
    let mut write_back = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-e" => {
                let expr = iter.next().context("-e requires a script argument")?;
                script.push_str(expr);
                if !expr.ends_with('\n') {
                    script.push('\n');
                }
            }
            "-f" => {
                let name = iter.next().context("-f requires a file argument")?;
                let path = shellexpand::tilde(name.as_str()).into_owned();
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read script {name}"))?;
                script.push_str(&text);
                if !text.ends_with('\n') {
                    script.push('\n');
                }
            }
            "-w" => write_back = true,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => files.push(other.to_string()),
        }
    }
    Ok(Options { script, files, write_back })
}

fn print_usage() {
    println!("tsumugi - structural text editing engine");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: tsumugi [-e script] [-f scriptfile] [-w] [file...]");
    println!("  -e script      run the given edit script");
    println!("  -f scriptfile  run the script read from a file");
    println!("  -w             write modified buffers back to disk");
}
