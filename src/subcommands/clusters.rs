use color_eyre::Result;

use segscope::{api::CustomerSource, view::ClusterCatalog};

use super::print_table;

pub async fn command(source: &dyn CustomerSource, json: bool) -> Result<()> {
    let mut catalog = ClusterCatalog::default();
    catalog.load(source).await;
    if let Some(err) = catalog.error() {
        return Err(color_eyre::eyre::eyre!("{err}"));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.summaries())?);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = catalog
        .summaries()
        .iter()
        .map(|summary| {
            vec![
                summary.cluster_id.to_string(),
                summary.cluster_name.clone(),
                summary.customer_count.to_string(),
                summary.stats.avg_age_label(),
                summary.stats.avg_premium_label(),
                summary.stats.avg_accidents_label(),
            ]
        })
        .collect();
    print_table(
        &["ID", "Segment", "Customers", "Avg Age", "Avg Premium", "Accidents"],
        &rows,
    );
    Ok(())
}
