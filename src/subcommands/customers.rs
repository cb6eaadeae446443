use color_eyre::{Result, eyre::eyre};

use segscope::{
    api::CustomerSource,
    view::{Commit, Controller, TopK},
};

use super::print_table;

pub async fn browse(source: &dyn CustomerSource, limit: u32, json: bool) -> Result<()> {
    let mut controller = Controller::default();
    let commit = controller.enter_browse(source, Some(limit)).await;
    print(&controller, commit, json)
}

pub async fn search(source: &dyn CustomerSource, query: &str, top_k: u32, json: bool) -> Result<()> {
    let top_k = TopK::new(top_k).ok_or_else(|| eyre!("unsupported result count {top_k}"))?;
    let mut controller = Controller::default();
    let commit = controller.enter_search(source, query, top_k).await?;
    print(&controller, commit, json)
}

pub async fn segment(
    source: &dyn CustomerSource,
    cluster_id: Option<u32>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let mut controller = Controller::default();
    let commit = controller
        .enter_cluster_filter(source, cluster_id, Some(limit))
        .await;
    print(&controller, commit, json)
}

fn print(controller: &Controller, commit: Commit, json: bool) -> Result<()> {
    let state = controller.state();
    if commit != Commit::Applied {
        let message = state.error().unwrap_or("request did not complete");
        return Err(eyre!("{message}"));
    }

    let records = state.records();
    if json {
        println!("{}", serde_json::to_string_pretty(records.records())?);
        return Ok(());
    }

    println!("{}", state.title());
    if records.is_empty() {
        println!("No customers found");
        return Ok(());
    }
    let shape = records.shape();
    let rows: Vec<Vec<String>> = records.records().iter().map(|r| shape.row(r)).collect();
    print_table(&shape.headers(), &rows);
    match shape.kind().ordering() {
        Some(ordering) => println!("{} customers, {ordering}", records.len()),
        None => println!("{} customers", records.len()),
    }
    Ok(())
}
