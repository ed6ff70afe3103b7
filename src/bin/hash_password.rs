use baseplatform::crypto::PasswordEncoder;
use clap::Parser;

/// Prints an Argon2 hash for seeding a `user` row by hand.
#[derive(Parser)]
struct Args {
    /// Raw password to encode.
    #[arg(default_value = "changeme")]
    password: String,
    /// Also print an INSERT for this username.
    #[arg(long)]
    username: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let hash = PasswordEncoder::default().encode(&args.password)?;
    match args.username {
        Some(username) => println!(
            "INSERT INTO \"user\" (username, password, enable) VALUES ('{}', '{}', TRUE);",
            username.replace('\'', "''"),
            hash
        ),
        None => println!("{hash}"),
    }
    Ok(())
}
