fn main() {
    std::process::exit(xcwrap_cli::run());
}
