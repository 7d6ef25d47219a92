// Copyright 2024 pyke.io
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Treats blank strings from the environment, cookies and API responses as absent.
pub trait Nonempty {
	/// Returns the value with surrounding whitespace removed, or `None` if nothing is left.
	fn nonempty(self) -> Option<String>;
}

impl Nonempty for String {
	fn nonempty(self) -> Option<String> {
		let trimmed = self.trim();
		if trimmed.is_empty() {
			None
		} else if trimmed.len() == self.len() {
			Some(self)
		} else {
			Some(trimmed.to_owned())
		}
	}
}

impl Nonempty for Option<String> {
	fn nonempty(self) -> Option<String> {
		self.and_then(Nonempty::nonempty)
	}
}
