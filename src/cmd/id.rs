//! Identifier derivation command: `commit-preview id`.

use anyhow::Result;

use commit_preview::preview::PreviewRequest;

pub fn cmd_id(owner: &str, repo: &str, commit: &str) -> Result<()> {
    let request = PreviewRequest::new(owner, repo, commit).validate()?;
    println!("{}", request.id());
    Ok(())
}
