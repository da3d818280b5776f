pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_projects.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_projects.sql")),
				"tables/002_rooms.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_rooms.sql")),
				"tables/003_analysis_jobs.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_analysis_jobs.sql")),
				"tables/004_recommendation_jobs.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_recommendation_jobs.sql")),
				"tables/005_visualization_jobs.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_visualization_jobs.sql")),
				"tables/006_product_match_jobs.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_product_match_jobs.sql")),
				"tables/007_usage_events.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_usage_events.sql")),
				"tables/008_rate_limits.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_rate_limits.sql")),
				"tables/009_job_outbox.sql" =>
					out.push_str(include_str!("../../../sql/tables/009_job_outbox.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
