// self
use crate::_prelude::*;

/// Roles that gate dashboards and management screens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
	/// Institution administrator.
	#[serde(rename = "admin", alias = "Admin", alias = "ADMIN")]
	Admin,
	/// Head of a department.
	#[serde(
		rename = "department_head",
		alias = "DepartmentHead",
		alias = "HOD",
		alias = "hod"
	)]
	DepartmentHead,
	/// Teacher attached to a department.
	#[serde(rename = "department_teacher", alias = "DepartmentTeacher", alias = "teacher")]
	DepartmentTeacher,
	/// Enrolled student.
	#[serde(rename = "student", alias = "Student")]
	Student,
	/// Any role this client does not know about yet.
	#[serde(other)]
	Unknown,
}
impl Role {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::DepartmentHead => "department_head",
			Role::DepartmentTeacher => "department_teacher",
			Role::Student => "student",
			Role::Unknown => "unknown",
		}
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Authenticated identity returned by the validation endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// User identifier.
	#[serde(alias = "_id")]
	pub id: String,
	/// Display name.
	#[serde(default)]
	pub name: String,
	/// Login email.
	pub email: String,
	/// Role used for view gating.
	pub role: Role,
	/// Department the user belongs to, if any.
	#[serde(default)]
	pub department: Option<String>,
	/// Avatar URL, if one was uploaded.
	#[serde(default)]
	pub avatar: Option<String>,
	/// Whether two-factor authentication is enabled.
	#[serde(default, alias = "is2FAEnabled", alias = "twoFactorAuthEnabled")]
	pub two_factor_enabled: bool,
	/// Remaining payload fields, preserved verbatim.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}
impl Session {
	/// Returns `true` when the session carries `role`.
	pub fn has_role(&self, role: Role) -> bool {
		self.role == role
	}

	/// Returns `true` when the session carries any of `roles`.
	pub fn has_any_role(&self, roles: &[Role]) -> bool {
		roles.contains(&self.role)
	}
}
