use crate::domain::access::identity::User;
use crate::domain::resource::resource::Resource;

/// Decides whether an identity may claim a resource.
///
/// Called once per candidate resource during placement, so implementations have to be
/// cheap and free of side effects.
pub trait AccessPolicy {
    type Identity: ?Sized;

    fn can_access_resource(&self, identity: &Self::Identity, resource: &Resource) -> bool;
}

/// Unrestricted resources are open to everyone, restricted ones to admins and members of one of their groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupMembershipPolicy;

impl AccessPolicy for GroupMembershipPolicy {
    type Identity = User;

    fn can_access_resource(&self, user: &User, resource: &Resource) -> bool {
        match &resource.groups {
            None => true,
            Some(_) if user.admin => true,
            Some(groups) => groups.iter().any(|group| user.is_member_of(group)),
        }
    }
}

impl<P: AccessPolicy + ?Sized> AccessPolicy for &P {
    type Identity = P::Identity;

    fn can_access_resource(&self, identity: &Self::Identity, resource: &Resource) -> bool {
        (**self).can_access_resource(identity, resource)
    }
}
