fn main() {
    if let Err(err) = csv_schemagen::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
