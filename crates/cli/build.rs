use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("excerpo")
        .version("0.1.0")
        .about("Clip web pages to Markdown and export them")
        .arg(clap::arg!(-v --verbose "Enable debug logging").global(true))
        .arg(clap::arg!(--base_url <URL> "Base URL of the knowledge-base service").global(true))
        .arg(clap::arg!(--storage <FILE> "Storage file override").global(true))
        .subcommand(
            clap::Command::new("clip")
                .about("Extract a page and print its Markdown")
                .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
                .arg(clap::arg!(-o --output <FILE> "Output file (default: stdout)"))
                .arg(clap::arg!(-c --category <KEY> "Content category").value_parser(["article", "research"])),
        )
        .subcommand(clap::Command::new("pair").about("Pair with the local knowledge-base application"))
        .subcommand(clap::Command::new("unpair").about("Remove the stored pairing credential"))
        .subcommand(clap::Command::new("status").about("Show service health and pairing state"))
        .subcommand(clap::Command::new("spaces").about("List available spaces"))
        .subcommand(
            clap::Command::new("types")
                .about("List object types in a space")
                .arg(clap::arg!(<SPACE_ID> "Space id")),
        )
        .subcommand(
            clap::Command::new("export")
                .about("Clip a page and export every block to the knowledge base")
                .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
                .arg(clap::arg!(-c --category <KEY> "Content category").value_parser(["article", "research"])),
        )
        .subcommand(
            clap::Command::new("settings")
                .about("Show or change settings")
                .arg(clap::arg!(--export <STATE> "Turn the export feature on or off").value_parser(["on", "off"])),
        );

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "excerpo", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "excerpo", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "excerpo", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "excerpo", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
