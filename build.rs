fn main() {
    // Embedded in `brewbus --version`
    let build_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    println!("cargo:rustc-env=BREWBUS_BUILD_DATE={}", build_date);
}
