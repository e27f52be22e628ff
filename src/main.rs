fn main() {
    if let Err(err) = stamboom::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
