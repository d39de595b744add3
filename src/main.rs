fn main() {
    if let Err(err) = chemviz_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
