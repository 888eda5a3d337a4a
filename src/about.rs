pub const PLASMID_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PLASMID_BUILD_N: &str = env!("PLASMID_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "plasmid-assembler {}\nBuild {}\nDeterministic plasmid construct assembly and validation",
        PLASMID_VERSION, PLASMID_BUILD_N
    )
}
