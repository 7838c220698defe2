fn main() {
    if let Err(err) = paydayd::run_entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
