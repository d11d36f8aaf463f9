pub fn render_schema(table: &str, vector_dim: usize) -> String {
	include_str!("../../../sql/init.sql")
		.replace("<TABLE>", table)
		.replace("<VECTOR_DIM>", &vector_dim.to_string())
}
