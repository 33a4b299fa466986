use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use luars::lua_vm::SafeOption;
use luars::{LuaResult, LuaVM, Stdlib};
use luars_yara::{YaraOption, open_yara_with};
use mimalloc::MiMalloc;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::rc::Rc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const VERSION: &str = concat!("lua-yara ", env!("CARGO_PKG_VERSION"));
const COPYRIGHT: &str = "Copyright (C) 2026 lua-rs CppCXY";

fn print_usage() {
    eprintln!("usage: lua-yara [options] [script [args]]");
    eprintln!("Available options are:");
    eprintln!("  -e stat   execute string 'stat'");
    eprintln!("  -L        expose yara.load");
    eprintln!("  -v        show version information");
    eprintln!("  -V        verbose logging (debug level)");
    eprintln!("  --        stop handling options");
    eprintln!("  -         stop handling options and execute stdin");
}

fn print_version() {
    println!("{}", VERSION);
    println!("{}", COPYRIGHT);
}

#[derive(Default)]
struct Options {
    execute_strings: Vec<String>,
    script_file: Option<String>,
    script_args: Vec<String>,
    enable_load: bool,
    show_version: bool,
    verbose: bool,
    read_stdin: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut i = 1;
    let mut stop_options = false;

    while i < args.len() {
        let arg = &args[i];

        if !stop_options && arg.starts_with('-') {
            match arg.as_str() {
                "-e" => {
                    i += 1;
                    let Some(code) = args.get(i) else {
                        return Err("'-e' needs argument".to_string());
                    };
                    opts.execute_strings.push(code.clone());
                }
                "-L" => opts.enable_load = true,
                "-v" => opts.show_version = true,
                "-V" => opts.verbose = true,
                "--" => stop_options = true,
                "-" => {
                    opts.read_stdin = true;
                    stop_options = true;
                }
                _ => return Err(format!("unrecognized option '{}'", arg)),
            }
        } else {
            // First non-option argument is the script, the rest belong to it
            opts.script_file = Some(arg.clone());
            opts.script_args = args[i + 1..].to_vec();
            break;
        }
        i += 1;
    }

    Ok(opts)
}

fn setup_logging(verbose: bool) -> Result<(), fern::InitError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                msg
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()?;
    Ok(())
}

fn setup_arg_table(
    vm: &mut LuaVM,
    exe_path: &str,
    script_name: Option<&str>,
    args: &[String],
) -> LuaResult<()> {
    // arg[-1] = interpreter, arg[0] = script, arg[1..] = script args
    let arg_table = vm.create_table(args.len(), 2)?;

    if let Some(name) = script_name {
        let s = vm.create_string(name)?;
        vm.raw_seti(&arg_table, 0, s);
    }

    let exe = vm.create_string(exe_path)?;
    vm.raw_seti(&arg_table, -1, exe);

    for (i, a) in args.iter().enumerate() {
        let s = vm.create_string(a)?;
        vm.raw_seti(&arg_table, (i + 1) as i64, s);
    }

    vm.set_global("arg", arg_table)
}

fn execute_source(vm: &mut LuaVM, code: &str, chunk_name: &str) -> Result<(), String> {
    let chunk = vm
        .compile_with_name(code, chunk_name)
        .map_err(|e| format!("{}: {}", chunk_name, vm.get_error_message(e)))?;

    match vm.execute_chunk(Rc::new(chunk)) {
        Ok(_) => Ok(()),
        Err(e) => {
            let error_msg = vm.get_error_message(e);
            Err(vm.generate_traceback(&error_msg).to_string())
        }
    }
}

fn execute_file(vm: &mut LuaVM, filename: &str) -> Result<(), String> {
    let code =
        fs::read_to_string(filename).map_err(|e| format!("cannot open {}: {}", filename, e))?;
    execute_source(vm, &code, filename)
}

fn execute_stdin(vm: &mut LuaVM) -> Result<(), String> {
    let mut code = String::new();
    io::stdin()
        .read_to_string(&mut code)
        .map_err(|e| format!("error reading stdin: {}", e))?;
    execute_source(vm, &code, "stdin")
}

fn main() {
    // Scan callbacks run nested inside pcall, so give the VM a deep native stack
    let stack_size = 16 * 1024 * 1024;
    let builder = std::thread::Builder::new()
        .name("lua-main".into())
        .stack_size(stack_size);

    let handler = builder
        .spawn(lua_main)
        .expect("Failed to spawn lua-main thread");

    match handler.join() {
        Ok(code) => std::process::exit(code),
        Err(_) => {
            eprintln!("lua-yara: internal error (thread panicked)");
            std::process::exit(1);
        }
    }
}

fn lua_main() -> i32 {
    let args: Vec<String> = env::args().collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("lua-yara: {}", e);
            print_usage();
            return 1;
        }
    };

    if let Err(e) = setup_logging(opts.verbose) {
        eprintln!("lua-yara: cannot set up logging: {}", e);
        return 1;
    }

    if opts.show_version {
        print_version();
        if opts.execute_strings.is_empty() && opts.script_file.is_none() && !opts.read_stdin {
            return 0;
        }
    }

    match run(&opts, &args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("lua-yara: {}", e);
            1
        }
    }
}

fn run(opts: &Options, args: &[String]) -> Result<(), String> {
    let mut vm = LuaVM::new(SafeOption {
        max_stack_size: 1000000,
        max_call_depth: if cfg!(debug_assertions) { 25 } else { 256 },
        base_call_depth: if cfg!(debug_assertions) { 25 } else { 256 },
        max_memory_limit: 1024 * 1024 * 1024,
    });
    vm.open_stdlib(Stdlib::All)
        .map_err(|e| format!("cannot open standard library: {}", e))?;

    let option = YaraOption {
        enable_load: opts.enable_load,
        ..YaraOption::default()
    };
    open_yara_with(&mut vm, &option)
        .map_err(|e| format!("cannot open yara library: {}", vm.get_error_message(e)))?;

    let exe_path = args.first().map(String::as_str).unwrap_or("lua-yara");
    setup_arg_table(
        &mut vm,
        exe_path,
        opts.script_file.as_deref(),
        &opts.script_args,
    )
    .map_err(|e| format!("cannot set up arg table: {}", e))?;

    // -e strings share the VM with the script that follows
    for code in &opts.execute_strings {
        execute_source(&mut vm, code, "=(command line)")?;
    }

    if let Some(filename) = &opts.script_file {
        execute_file(&mut vm, filename)?;
    } else if opts.read_stdin {
        execute_stdin(&mut vm)?;
    } else if opts.execute_strings.is_empty() && !opts.show_version {
        print_usage();
    }

    Ok(())
}
