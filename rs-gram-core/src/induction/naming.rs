/// Name of the `index`-th category: `A`..`Z`, then `AA`, `AB`, ... (spreadsheet columns).
pub fn category_name(index: usize) -> String {
	let mut name = Vec::new();
	let mut rest = index + 1;
	while rest > 0 {
		rest -= 1;
		name.push(b'A' + (rest % 26) as u8);
		rest /= 26;
	}
	name.reverse();
	String::from_utf8_lossy(&name).into_owned()
}
