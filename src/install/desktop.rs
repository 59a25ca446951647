//! Desktop entry and helper script generation.

use std::path::Path;

use super::InstallLayout;

const DESKTOP_FILE_INSTALL_VERSION: &str = "0.24";

/// Render the desktop entry describing how to launch the installed binary
///
/// Both descriptor locations receive exactly this content.
pub fn render_descriptor(layout: &InstallLayout) -> String {
    let mut content = String::with_capacity(256);
    content.push_str("[Desktop Entry]\n");
    content.push_str("Version=1.0\n");
    content.push_str("Type=Application\n");
    content.push_str("Terminal=false\n");
    content.push_str(&format!("Exec={}\n", exec_value(&layout.bin_path)));
    content.push_str(&format!("Path={}\n", layout.install_dir.display()));
    content.push_str(&format!("Name={}\n", layout.display_name));
    content.push_str(&format!("Icon={}\n", layout.icon_path.display()));
    content.push_str(&format!(
        "X-Desktop-File-Install-Version={DESKTOP_FILE_INSTALL_VERSION}\n"
    ));
    content
}

/// Script that recreates both descriptors and, on a machine where the
/// marker is absent, runs the binary once so it installs itself.
pub fn render_install_script(layout: &InstallLayout) -> String {
    let desktop = quote(&layout.desktop_file);
    let menu = quote(&layout.menu_desktop_file);
    let marker = quote(&layout.marker_path);
    let bin = quote(&layout.bin_path);

    let mut script = String::with_capacity(1024);
    script.push_str("#!/bin/bash\n");
    script.push_str("set -e\n\n");
    script.push_str(&format!("echo {desktop}\n"));
    script.push_str(&format!("cat > {desktop} <<'EOF'\n"));
    script.push_str(&render_descriptor(layout));
    script.push_str("EOF\n\n");
    script.push_str(&format!("echo {menu}\n"));
    script.push_str(&format!("mkdir -p {}\n", quote_dir(&layout.menu_desktop_file)));
    script.push_str(&format!("cp {desktop} {menu}\n\n"));
    script.push_str(&format!("chmod 755 {desktop}\n"));
    script.push_str(&format!("chmod 755 {menu}\n\n"));
    script.push_str(&format!("if [ ! -f {marker} ]; then\n"));
    script.push_str(&format!("    cd {} && {bin}\n", quote(&layout.install_dir)));
    script.push_str("fi\n");
    script
}

/// Script that removes both descriptors and the install marker
pub fn render_uninstall_script(layout: &InstallLayout) -> String {
    let mut script = String::with_capacity(512);
    script.push_str("#!/bin/bash\n");
    for path in [&layout.desktop_file, &layout.menu_desktop_file, &layout.marker_path] {
        let quoted = quote(path);
        script.push_str(&format!("echo {quoted}\n"));
        script.push_str(&format!("rm -f {quoted}\n"));
    }
    script
}

/// Exec values containing whitespace must be quoted
fn exec_value(path: &Path) -> String {
    let text = path.display().to_string();
    if text.contains(char::is_whitespace) {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

/// Single-quote a path for bash
fn quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

fn quote_dir(path: &Path) -> String {
    path.parent().map(quote).unwrap_or_else(|| "'.'".to_string())
}
