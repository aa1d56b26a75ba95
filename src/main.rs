fn main() {
    if let Err(e) = faqchat_lib::run() {
        eprintln!("faqchat: {}", e);
        std::process::exit(1);
    }
}
