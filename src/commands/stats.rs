// Stats query command
use crate::analysis::{Period, QueryEngine, QueryParams};
use crate::commands::handle_error;
use crate::config::Config;
use crate::output::OutputFormat;
use crate::storage::StatsStore;

pub struct StatsOptions {
    pub period: Option<String>,
    pub days: Option<i64>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub details: bool,
    pub limit: Option<usize>,
}

impl StatsOptions {
    pub fn to_params(&self) -> anyhow::Result<QueryParams> {
        let period = self
            .period
            .as_deref()
            .map(str::parse::<Period>)
            .transpose()?;

        Ok(QueryParams {
            relative_days: self.days,
            start_date: self.since.clone(),
            end_date: self.until.clone(),
            period,
            include_details: self.details,
            limit: self.limit,
        })
    }
}

pub async fn handle_stats_command(
    options: StatsOptions,
    config: &Config,
    json_output: bool,
) -> anyhow::Result<()> {
    let params = match options.to_params() {
        Ok(params) => params,
        Err(e) => {
            handle_error("Invalid query", &e, json_output);
            return Err(e);
        }
    };

    let store = StatsStore::at_default_path()?;
    let engine = QueryEngine::new(store).with_default_limit(config.query.default_limit);

    let result = match engine.query(&params).await {
        Ok(result) => result,
        Err(e) => {
            handle_error("Query failed", &e, json_output);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", result.to_json()?);
    } else {
        println!(
            "{}",
            result.to_table_with_options(config.output.decimal_places, config.output.unicode)
        );
    }
    Ok(())
}
