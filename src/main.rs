fn main() -> std::process::ExitCode {
    store_walkthrough_lib::run()
}
