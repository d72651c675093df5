fn main() {
    // Rerun if the dashboard changes
    println!("cargo:rerun-if-changed=frontend/");

    // rust-embed needs the folder to exist even when the dashboard was stripped
    let index = std::path::Path::new("frontend/index.html");
    if !index.exists() {
        println!("cargo:warning=frontend/index.html not found, embedding a placeholder page");
        std::fs::create_dir_all("frontend").ok();
        std::fs::write(
            index,
            r#"<!DOCTYPE html>
<html>
<head><title>SpeedScale</title></head>
<body>
    <h1>SpeedScale backend</h1>
    <p>API is running. Try <code>/api/compare</code> or <code>/api/stats</code>.</p>
</body>
</html>"#,
        )
        .ok();
    }
}
