fn main() {
    if let Err(e) = scribetable_lib::run() {
        eprintln!("scribetable: {e}");
        std::process::exit(1);
    }
}
