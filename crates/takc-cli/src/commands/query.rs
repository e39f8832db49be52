//! Query command

use crate::app::{OutputFormat, QueryArgs};
use crate::output;
use anyhow::Result;
use takc_core::{CompressionRate, KnowledgeService, Query};

pub async fn run(args: QueryArgs, service: &KnowledgeService, format: OutputFormat) -> Result<()> {
    let mut query = Query::new(args.task_type, args.query.join(" "));
    if let Some(rate) = &args.rate {
        query = query.with_rate(rate.parse::<CompressionRate>()?);
    }

    let answer = service.answer(&query).await?;
    output::emit(&answer, format, output::terminal::print_answer)
}
